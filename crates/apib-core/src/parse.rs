use apib_grammar::{parse_blueprint, Blueprint, GrammarError};
use async_trait::async_trait;

use crate::error::{CompileError, CompileResult};

/// Engine that turns finalized blueprint text into its structural tree.
#[async_trait]
pub trait GrammarEngine: Send + Sync {
    async fn parse(&self, text: &str) -> Result<Blueprint, GrammarError>;
}

/// Bundled engine backed by `apib-grammar`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlueprintGrammar;

#[async_trait]
impl GrammarEngine for BlueprintGrammar {
    async fn parse(&self, text: &str) -> Result<Blueprint, GrammarError> {
        parse_blueprint(text)
    }
}

/// Parse `text` with `engine`. Empty input is rejected before the engine runs.
pub async fn parse(text: &str, engine: &dyn GrammarEngine) -> CompileResult<Blueprint> {
    if text.trim().is_empty() {
        return Err(CompileError::Input("markdown data required".into()));
    }
    Ok(engine.parse(text).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rejecting;

    #[async_trait]
    impl GrammarEngine for Rejecting {
        async fn parse(&self, _text: &str) -> Result<Blueprint, GrammarError> {
            Err(GrammarError::new(4, "unexpected token"))
        }
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_the_engine() {
        let err = parse("  \n", &Rejecting).await.unwrap_err();
        assert!(matches!(err, CompileError::Input(_)));
    }

    #[tokio::test]
    async fn engine_errors_keep_their_message() {
        let err = parse("# API", &Rejecting).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to parse blueprint: line 4: unexpected token"
        );
    }

    #[tokio::test]
    async fn bundled_engine_reads_api_name() {
        let blueprint = parse("FORMAT: 1A\n\n# Polls\n", &BlueprintGrammar)
            .await
            .unwrap();
        assert_eq!(blueprint.name.as_deref(), Some("Polls"));
    }
}
