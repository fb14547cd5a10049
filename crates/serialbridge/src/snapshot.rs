//! Snapshot payload assembly.
//!
//! A snapshot is a list of queue positions followed by one staleness token,
//! e.g. `3,12,1.23:45:01`. Each part falls back independently to a sentinel
//! the peer firmware renders as "unknown".

use regex::Regex;

/// Queue field sent when no positions could be read.
pub const FALLBACK_QUEUE: &str = "99,99";

/// Staleness token sent when the agent row could not be read.
pub const FALLBACK_STALENESS: &str = "9.99:99:99";

/// Section header introducing the queue-position text in a page dump.
pub const QUEUE_SECTION: &str = "[queue]";

/// Section header introducing the agent-table text in a page dump.
pub const AGENTS_SECTION: &str = "[agents]";

/// The payload sent when nothing could be read at all.
pub fn fallback_payload() -> String {
    Snapshot::fallback().to_payload()
}

/// One reading of the monitored page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Queue positions as decimal strings, in page order.
    pub queue_positions: Vec<String>,
    /// Staleness token for the tracked agent.
    pub staleness: Option<String>,
}

impl Snapshot {
    /// A snapshot where every field is unknown.
    pub fn fallback() -> Self {
        Self::default()
    }

    pub fn queue_field(&self) -> String {
        if self.queue_positions.is_empty() {
            FALLBACK_QUEUE.to_string()
        } else {
            self.queue_positions.join(",")
        }
    }

    pub fn staleness_field(&self) -> &str {
        self.staleness.as_deref().unwrap_or(FALLBACK_STALENESS)
    }

    /// Wire payload: queue fields, then the staleness token.
    pub fn to_payload(&self) -> String {
        format!("{},{}", self.queue_field(), self.staleness_field())
    }
}

/// Text sections of a page dump written by the external scraper.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageText {
    pub queue: Option<String>,
    pub agents: Option<String>,
}

impl PageText {
    /// Split a dump into its `[queue]` and `[agents]` sections.
    ///
    /// Lines before the first header are ignored; unknown headers end the
    /// current section.
    pub fn parse(dump: &str) -> Self {
        let mut page = PageText::default();
        let mut current: Option<&mut Option<String>> = None;

        for line in dump.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                current = match trimmed {
                    QUEUE_SECTION => Some(&mut page.queue),
                    AGENTS_SECTION => Some(&mut page.agents),
                    _ => None,
                };
                if let Some(section) = current.as_mut() {
                    section.get_or_insert_with(String::new);
                }
                continue;
            }

            if let Some(Some(section)) = current.as_mut() {
                if !section.is_empty() {
                    section.push('\n');
                }
                section.push_str(line);
            }
        }

        page
    }
}

/// Extracts snapshot fields from page text.
#[derive(Debug, Clone)]
pub struct SnapshotParser {
    queue: Regex,
    staleness: Regex,
}

impl SnapshotParser {
    /// Build a parser tracking the staleness of `agent`.
    pub fn new(agent: &str) -> std::result::Result<Self, regex::Error> {
        let queue = Regex::new(r"\d+|N/A")?;
        let staleness = Regex::new(&format!(
            r"{} ([1-7]?\.?\d\d:\d\d:\d\d|> 1 week)",
            regex::escape(agent)
        ))?;
        Ok(Self { queue, staleness })
    }

    /// Every number or `N/A` in the queue text, with `N/A` read as `0`.
    pub fn queue_positions(&self, text: &str) -> Vec<String> {
        self.queue
            .find_iter(text)
            .map(|m| match m.as_str() {
                "N/A" => "0".to_string(),
                digits => digits.to_string(),
            })
            .collect()
    }

    /// The agent's staleness token (`H:MM:SS`, `D.HH:MM:SS` or `> 1 week`).
    pub fn staleness(&self, text: &str) -> Option<String> {
        self.staleness
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Build a snapshot; missing sections leave their field unknown.
    pub fn snapshot(&self, page: &PageText) -> Snapshot {
        Snapshot {
            queue_positions: page
                .queue
                .as_deref()
                .map(|text| self.queue_positions(text))
                .unwrap_or_default(),
            staleness: page.agents.as_deref().and_then(|text| self.staleness(text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> SnapshotParser {
        SnapshotParser::new("Andrew Chulock").unwrap()
    }

    #[test]
    fn fallback_payload_uses_sentinels() {
        assert_eq!(fallback_payload(), "99,99,9.99:99:99");
    }

    #[test]
    fn payload_joins_queue_and_staleness() {
        let snapshot = Snapshot {
            queue_positions: vec!["3".to_string(), "12".to_string()],
            staleness: Some("1.23:45:01".to_string()),
        };
        assert_eq!(snapshot.to_payload(), "3,12,1.23:45:01");
    }

    #[test]
    fn fields_fall_back_independently() {
        let no_queue = Snapshot {
            queue_positions: Vec::new(),
            staleness: Some("00:05:00".to_string()),
        };
        assert_eq!(no_queue.to_payload(), "99,99,00:05:00");

        let no_stale = Snapshot {
            queue_positions: vec!["4".to_string()],
            staleness: None,
        };
        assert_eq!(no_stale.to_payload(), "4,9.99:99:99");
    }

    #[test]
    fn queue_positions_replace_not_available() {
        let text = "FL_English 3\nNOC N/A\nPrequeue 12";
        assert_eq!(parser().queue_positions(text), vec!["3", "0", "12"]);
    }

    #[test]
    fn staleness_formats() {
        let p = parser();
        assert_eq!(
            p.staleness("Jane Doe 00:01:00\nAndrew Chulock 1.23:45:01 Available")
                .as_deref(),
            Some("1.23:45:01")
        );
        assert_eq!(
            p.staleness("Andrew Chulock 04:10:59").as_deref(),
            Some("04:10:59")
        );
        assert_eq!(
            p.staleness("Andrew Chulock > 1 week").as_deref(),
            Some("> 1 week")
        );
        assert_eq!(p.staleness("Andrew Chulock offline"), None);
        assert_eq!(p.staleness("Someone Else 00:00:01"), None);
    }

    #[test]
    fn agent_name_is_matched_literally() {
        let p = SnapshotParser::new("A. Smith (NOC)").unwrap();
        assert_eq!(
            p.staleness("A. Smith (NOC) 00:00:09").as_deref(),
            Some("00:00:09")
        );
        assert_eq!(p.staleness("AX Smith (NOC) 00:00:09"), None);
    }

    #[test]
    fn page_text_sections() {
        let dump = "scraped at 12:00\n[queue]\nFL 3\nNOC N/A\n[agents]\nAndrew Chulock 00:02:10\n";
        let page = PageText::parse(dump);
        assert_eq!(page.queue.as_deref(), Some("FL 3\nNOC N/A"));
        assert_eq!(page.agents.as_deref(), Some("Andrew Chulock 00:02:10"));

        let snapshot = parser().snapshot(&page);
        assert_eq!(snapshot.to_payload(), "3,0,00:02:10");
    }

    #[test]
    fn missing_sections_fall_back() {
        let page = PageText::parse("[agents]\nAndrew Chulock 00:00:30\n[footer]\n42");
        assert!(page.queue.is_none());
        assert_eq!(page.agents.as_deref(), Some("Andrew Chulock 00:00:30"));
        assert_eq!(parser().snapshot(&page).to_payload(), "99,99,00:00:30");

        let empty = PageText::parse("");
        assert_eq!(parser().snapshot(&empty).to_payload(), fallback_payload());
    }
}
