use apib_grammar::{parse_blueprint, Method, PayloadKind};
use pretty_assertions::assert_eq;

const NOTES: &str = r#"FORMAT: 1A
HOST: https://api.example.com

# Notes API

Notes is a simple API.

# Group Notes

Notes related resources.

## Notes Collection [/notes]

### List All Notes [GET]

+ Response 200 (application/json)

        [{"id": 1, "title": "Jogging"}]

### Create a Note [POST]

+ Request (application/json)

        {"title": "Buy milk"}

+ Response 201 (application/json)

    + Headers

            Location: /notes/2

    + Body

            {"id": 2, "title": "Buy milk"}

## Note [/notes/{id}]

### Remove a Note [DELETE]

+ Response 204
"#;

#[test]
fn parses_groups_resources_and_actions() {
    let blueprint = parse_blueprint(NOTES).expect("parse notes blueprint");

    assert_eq!(blueprint.metadata_value("format"), Some("1A"));
    assert_eq!(blueprint.metadata_value("HOST"), Some("https://api.example.com"));
    assert_eq!(blueprint.name.as_deref(), Some("Notes API"));
    assert_eq!(blueprint.description, "Notes is a simple API.");

    assert_eq!(blueprint.groups.len(), 1);
    let group = &blueprint.groups[0];
    assert_eq!(group.name.as_deref(), Some("Notes"));
    assert_eq!(group.description, "Notes related resources.");

    let uris: Vec<_> = blueprint
        .resources()
        .map(|resource| resource.uri_template.as_str())
        .collect();
    assert_eq!(uris, vec!["/notes", "/notes/{id}"]);

    let methods: Vec<_> = blueprint.actions().map(|action| action.method).collect();
    assert_eq!(methods, vec![Method::Get, Method::Post, Method::Delete]);
}

#[test]
fn captures_payload_bodies_and_headers() {
    let blueprint = parse_blueprint(NOTES).expect("parse notes blueprint");
    let actions: Vec<_> = blueprint.actions().collect();

    let list = &actions[0].responses[0];
    assert_eq!(list.status, Some(200));
    assert_eq!(list.body.as_deref(), Some(r#"[{"id": 1, "title": "Jogging"}]"#));

    let create = actions[1];
    assert_eq!(create.name.as_deref(), Some("Create a Note"));
    assert_eq!(create.requests.len(), 1);
    assert_eq!(create.requests[0].kind, PayloadKind::Request);
    assert_eq!(
        create.requests[0].body.as_deref(),
        Some(r#"{"title": "Buy milk"}"#)
    );

    let created = &create.responses[0];
    assert_eq!(created.status, Some(201));
    assert_eq!(created.header("Location"), Some("/notes/2"));
    assert_eq!(created.headers[0].name, "Content-Type");
    assert_eq!(
        created.body.as_deref(),
        Some(r#"{"id": 2, "title": "Buy milk"}"#)
    );

    let removed = &actions[2].responses[0];
    assert_eq!(removed.status, Some(204));
    assert!(removed.body.is_none());
    assert!(removed.headers.is_empty());
}

#[test]
fn action_outside_resource_is_an_error() {
    let err = parse_blueprint("# API\n\n## Orphan [GET]\n").unwrap_err();
    assert_eq!(err.line, 3);
    assert!(err.message.contains("outside of a resource"));
}

#[test]
fn response_outside_action_is_an_error() {
    let err = parse_blueprint("# API\n\n+ Response 200\n").unwrap_err();
    assert_eq!(err.line, 3);
    assert_eq!(err.message, "response declared outside of an action");
}

#[test]
fn unclosed_fence_is_an_error() {
    let err = parse_blueprint("# API\n\n```json\n{}\n").unwrap_err();
    assert_eq!(err.line, 3);
}

#[test]
fn headings_inside_fences_stay_in_descriptions() {
    let blueprint = parse_blueprint("# API\n\n```\n## Fake [/fake]\n```\n").unwrap();
    assert!(blueprint.groups.is_empty());
    assert_eq!(blueprint.description, "```\n## Fake [/fake]\n```");
}

#[test]
fn endpoint_shorthand_creates_resource_and_action() {
    let blueprint = parse_blueprint("# API\n\n## GET /status\n\n+ Response 200\n").unwrap();
    let resource = blueprint.resources().next().expect("resource");
    assert_eq!(resource.uri_template, "/status");
    assert_eq!(resource.actions.len(), 1);
    assert_eq!(resource.actions[0].method, Method::Get);
    assert_eq!(resource.actions[0].responses.len(), 1);
}

#[test]
fn setext_heading_names_the_api() {
    let blueprint = parse_blueprint("Notes API\n=========\n\nWelcome.\n").unwrap();
    assert_eq!(blueprint.name.as_deref(), Some("Notes API"));
    assert_eq!(blueprint.description, "Welcome.");
}

#[test]
fn serializes_methods_in_upper_case() {
    let blueprint = parse_blueprint(NOTES).unwrap();
    let value = serde_json::to_value(&blueprint).unwrap();
    assert_eq!(
        value["groups"][0]["resources"][0]["actions"][0]["method"],
        "GET"
    );
    assert_eq!(
        value["groups"][0]["resources"][0]["actions"][0]["responses"][0]["kind"],
        "response"
    );
}
