use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{Action, Blueprint, Metadata, Method, PayloadKind, Resource, ResourceGroup};
use crate::error::{GrammarError, GrammarResult};
use crate::fence::FenceTracker;
use crate::heading::{detect_heading, Heading};
use crate::line::{split_lines, LineRecord};
use crate::payload::{build_payload, content_end, payload_item};

static METADATA_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<key>[A-Za-z][A-Za-z0-9_-]*):\s*(?P<value>.*?)\s*$").expect("metadata regex")
});
static ACTION_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?P<name>.*?)\s+)?\[(?P<method>[A-Z]+)(?:\s+(?P<uri>/\S*))?\]$")
        .expect("action regex")
});
static RESOURCE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?P<name>.*?)\s+)?\[(?P<uri>/[^\]\s]*)\]$").expect("resource regex")
});
static ENDPOINT_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<method>[A-Z]+)\s+(?P<uri>/\S*)$").expect("endpoint regex"));

/// Which node currently receives free-standing description lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Api,
    Group,
    Resource,
    Action,
}

pub(crate) struct BlueprintParser {
    lines: Vec<LineRecord>,
    blueprint: Blueprint,
    scope: Scope,
    fences: FenceTracker,
    in_metadata: bool,
}

impl BlueprintParser {
    pub(crate) fn new(source: &str) -> Self {
        Self {
            lines: split_lines(source),
            blueprint: Blueprint::default(),
            scope: Scope::Api,
            fences: FenceTracker::default(),
            in_metadata: true,
        }
    }

    pub(crate) fn run(mut self) -> GrammarResult<Blueprint> {
        let mut idx = 0usize;
        while idx < self.lines.len() {
            let line = self.lines[idx].clone();

            if self.fences.process(&line.text, line.number) {
                self.in_metadata = false;
                self.append_description(&line.text);
                idx += 1;
                continue;
            }

            if self.in_metadata {
                if line.is_blank() {
                    idx += 1;
                    continue;
                }
                if let Some(captures) = METADATA_LINE.captures(&line.text) {
                    self.blueprint.metadata.push(Metadata {
                        key: captures["key"].to_string(),
                        value: captures["value"].to_string(),
                    });
                    idx += 1;
                    continue;
                }
                self.in_metadata = false;
            }

            if let Some(heading) = detect_heading(&self.lines, idx) {
                self.enter_heading(&heading, line.number)?;
                idx += heading.span;
                continue;
            }

            if let Some(item) = payload_item(&line)? {
                if self.scope != Scope::Action {
                    let noun = match item.kind {
                        PayloadKind::Request => "request",
                        PayloadKind::Response => "response",
                    };
                    return Err(GrammarError::new(
                        line.number,
                        format!("{noun} declared outside of an action"),
                    ));
                }
                let end = content_end(&self.lines, idx);
                let payload = build_payload(item, &line, &self.lines[idx + 1..end])?;
                if let Some(action) = self.current_action() {
                    match payload.kind {
                        PayloadKind::Request => action.requests.push(payload),
                        PayloadKind::Response => action.responses.push(payload),
                    }
                }
                idx = end;
                continue;
            }

            self.append_description(&line.text);
            idx += 1;
        }

        if let Some(opened_at) = self.fences.unclosed() {
            return Err(GrammarError::new(opened_at, "unclosed code fence"));
        }

        Ok(finish(self.blueprint))
    }

    fn enter_heading(&mut self, heading: &Heading, line: usize) -> GrammarResult<()> {
        let text = heading.normalized.as_str();

        if let Some(name) = text.strip_prefix("Group ") {
            self.blueprint.groups.push(ResourceGroup {
                name: Some(name.trim().to_string()),
                ..ResourceGroup::default()
            });
            self.scope = Scope::Group;
            return Ok(());
        }

        if let Some(captures) = ACTION_HEADING.captures(text) {
            if let Some(method) = Method::parse(&captures["method"]) {
                if !matches!(self.scope, Scope::Resource | Scope::Action) {
                    return Err(GrammarError::new(
                        line,
                        format!("action '{text}' declared outside of a resource"),
                    ));
                }
                let action = Action {
                    name: captures.name("name").map(|m| m.as_str().to_string()),
                    method,
                    uri_template: captures.name("uri").map(|m| m.as_str().to_string()),
                    description: String::new(),
                    requests: Vec::new(),
                    responses: Vec::new(),
                    line,
                };
                if let Some(resource) = self.current_resource() {
                    resource.actions.push(action);
                }
                self.scope = Scope::Action;
                return Ok(());
            }
        }

        if let Some(captures) = RESOURCE_HEADING.captures(text) {
            self.push_resource(Resource {
                name: captures.name("name").map(|m| m.as_str().to_string()),
                uri_template: captures["uri"].to_string(),
                description: String::new(),
                actions: Vec::new(),
                line,
            });
            return Ok(());
        }

        if let Some(captures) = ENDPOINT_HEADING.captures(text) {
            if let Some(method) = Method::parse(&captures["method"]) {
                self.push_resource(Resource {
                    name: None,
                    uri_template: captures["uri"].to_string(),
                    description: String::new(),
                    actions: vec![Action {
                        name: None,
                        method,
                        uri_template: None,
                        description: String::new(),
                        requests: Vec::new(),
                        responses: Vec::new(),
                        line,
                    }],
                    line,
                });
                self.scope = Scope::Action;
                return Ok(());
            }
        }

        if self.scope == Scope::Api
            && self.blueprint.name.is_none()
            && self.blueprint.groups.is_empty()
        {
            self.blueprint.name = Some(text.to_string());
            return Ok(());
        }

        let rendered = format!("{} {}", "#".repeat(heading.depth), heading.raw);
        self.append_description(&rendered);
        Ok(())
    }

    fn push_resource(&mut self, resource: Resource) {
        if self.scope == Scope::Api || self.blueprint.groups.is_empty() {
            self.blueprint.groups.push(ResourceGroup::default());
        }
        if let Some(group) = self.blueprint.groups.last_mut() {
            group.resources.push(resource);
        }
        self.scope = Scope::Resource;
    }

    fn current_resource(&mut self) -> Option<&mut Resource> {
        self.blueprint
            .groups
            .last_mut()
            .and_then(|group| group.resources.last_mut())
    }

    fn current_action(&mut self) -> Option<&mut Action> {
        self.current_resource()
            .and_then(|resource| resource.actions.last_mut())
    }

    fn append_description(&mut self, text: &str) {
        let target = self.description_mut();
        target.push_str(text);
        target.push('\n');
    }

    fn description_mut(&mut self) -> &mut String {
        let blueprint = &mut self.blueprint;
        let Some(group) = blueprint.groups.last_mut() else {
            return &mut blueprint.description;
        };
        if self.scope == Scope::Api {
            return &mut blueprint.description;
        }
        if self.scope == Scope::Group {
            return &mut group.description;
        }

        let Some(resource) = group.resources.last_mut() else {
            return &mut group.description;
        };
        if self.scope == Scope::Resource {
            return &mut resource.description;
        }

        match resource.actions.last_mut() {
            Some(action) => &mut action.description,
            None => &mut resource.description,
        }
    }
}

fn finish(mut blueprint: Blueprint) -> Blueprint {
    tidy(&mut blueprint.description);
    for group in &mut blueprint.groups {
        tidy(&mut group.description);
        for resource in &mut group.resources {
            tidy(&mut resource.description);
            for action in &mut resource.actions {
                tidy(&mut action.description);
            }
        }
    }
    blueprint
}

fn tidy(description: &mut String) {
    let trimmed = description.trim_matches(|ch: char| ch == '\n' || ch == '\r');
    let trimmed = trimmed.trim_end();
    *description = trimmed.to_string();
}
