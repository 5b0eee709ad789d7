use serde::Serialize;

/// Container image a job runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    name: String,
    tag: Option<String>,
    entrypoint: Option<Vec<String>>,
}

impl Image {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: None,
            entrypoint: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_entrypoint<I, S>(mut self, entrypoint: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entrypoint = Some(entrypoint.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.name.trim().is_empty()
    }

    pub fn render(&self) -> RenderedImage {
        let name = match &self.tag {
            Some(tag) => format!("{}:{}", self.name, tag),
            None => self.name.clone(),
        };
        RenderedImage {
            name,
            entrypoint: self.entrypoint.clone(),
        }
    }
}

impl From<&str> for Image {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Image {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedImage {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
}

/// Sidecar container started next to every job of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Service(String);

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Service {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_appended_to_name() {
        let rendered = Image::new("python")
            .with_tag("3.12-slim")
            .with_entrypoint([""])
            .render();
        assert_eq!(rendered.name, "python:3.12-slim");
        assert_eq!(rendered.entrypoint, Some(vec![String::new()]));
    }
}
