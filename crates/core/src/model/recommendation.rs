use serde::{Deserialize, Serialize};

/// Study material suggested for a topic the learner struggled with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    topic: String,
    video_url: Option<String>,
    resource_url: Option<String>,
}

fn non_blank(url: Option<String>) -> Option<String> {
    url.map(|u| u.trim().to_owned()).filter(|u| !u.is_empty())
}

impl Recommendation {
    /// Blank links are dropped.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        video_url: Option<String>,
        resource_url: Option<String>,
    ) -> Self {
        Self {
            topic: topic.into().trim().to_owned(),
            video_url: non_blank(video_url),
            resource_url: non_blank(resource_url),
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }

    #[must_use]
    pub fn resource_url(&self) -> Option<&str> {
        self.resource_url.as_deref()
    }

    /// True when neither link is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.video_url.is_none() && self.resource_url.is_none()
    }

    /// Re-file under another topic name, e.g. the canonical one.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_links_are_dropped() {
        let rec = Recommendation::new(
            " Graphs ",
            Some("https://example.org/bfs".to_string()),
            Some("   ".to_string()),
        );
        assert_eq!(rec.topic(), "Graphs");
        assert_eq!(rec.video_url(), Some("https://example.org/bfs"));
        assert_eq!(rec.resource_url(), None);
        assert!(!rec.is_empty());

        assert!(Recommendation::new("Graphs", None, Some(String::new())).is_empty());
    }
}
