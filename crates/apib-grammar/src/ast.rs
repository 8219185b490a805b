use std::fmt;

use serde::Serialize;

/// Parsed API Blueprint document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Blueprint {
    pub metadata: Vec<Metadata>,
    pub name: Option<String>,
    pub description: String,
    pub groups: Vec<ResourceGroup>,
}

impl Blueprint {
    /// Look up a metadata value by key, case-insensitively.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|entry| entry.key.eq_ignore_ascii_case(key))
            .map(|entry| entry.value.as_str())
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.groups.iter().flat_map(|group| group.resources.iter())
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.resources().flat_map(|resource| resource.actions.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub key: String,
    pub value: String,
}

/// Resource group. Resources declared before any `# Group` land in an unnamed group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceGroup {
    pub name: Option<String>,
    pub description: String,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub name: Option<String>,
    pub uri_template: String,
    pub description: String,
    pub actions: Vec<Action>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub name: Option<String>,
    pub method: Method,
    /// Set when the action overrides its resource's URI template.
    pub uri_template: Option<String>,
    pub description: String,
    pub requests: Vec<Payload>,
    pub responses: Vec<Payload>,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "PATCH" => Some(Method::Patch),
            "DELETE" => Some(Method::Delete),
            "HEAD" => Some(Method::Head),
            "OPTIONS" => Some(Method::Options),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Request,
    Response,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    pub kind: PayloadKind,
    pub name: Option<String>,
    /// Response status; always `None` for requests.
    pub status: Option<u16>,
    pub media_type: Option<String>,
    pub description: String,
    pub headers: Vec<Header>,
    pub body: Option<String>,
    pub schema: Option<String>,
    pub line: usize,
}

impl Payload {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}
