//! Lark interactive-card message model and builder.

use serde::Serialize;

/// Top-level body POSTed to a Lark custom-bot webhook.
#[derive(Debug, Clone, Serialize)]
pub struct LarkMessage {
    pub msg_type: &'static str,
    pub card: Card,
}

#[derive(Debug, Clone, Serialize)]
pub struct Card {
    pub config: CardConfig,
    pub header: CardHeader,
    pub elements: Vec<CardElement>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardConfig {
    pub wide_screen_mode: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardHeader {
    pub title: CardText,
    pub template: HeaderColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderColor {
    /// Applications.
    Blue,
    /// Inquiries.
    Orange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tag")]
pub enum CardText {
    #[serde(rename = "plain_text")]
    Plain { content: String },
    #[serde(rename = "lark_md")]
    Markdown { content: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CardField {
    pub is_short: bool,
    pub text: CardText,
}

// Only the elements our notifications use.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum CardElement {
    Div {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<CardText>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        fields: Vec<CardField>,
    },
    Hr,
    Note { elements: Vec<CardText> },
}

const MD_SPECIALS: &[char] = &['\\', '*', '_', '~', '`', '[', ']', '<', '>'];

/// Escapes user input for a `lark_md` block.
pub fn escape_md(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if MD_SPECIALS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Assembles a card from labelled fields. Consecutive short fields are
/// grouped into one `div` so Lark lays them out two per row.
#[derive(Debug)]
pub struct CardBuilder {
    header: CardHeader,
    elements: Vec<CardElement>,
    pending: Vec<CardField>,
}

impl CardBuilder {
    pub fn new(title: impl Into<String>, color: HeaderColor) -> Self {
        Self {
            header: CardHeader {
                title: CardText::Plain {
                    content: title.into(),
                },
                template: color,
            },
            elements: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Short labelled field. Empty or missing values render as `-`.
    pub fn field(mut self, label: &str, value: Option<&str>) -> Self {
        self.pending.push(CardField {
            is_short: true,
            text: labelled(label, value),
        });
        self
    }

    /// Full-width labelled field, for free text.
    pub fn long_field(mut self, label: &str, value: Option<&str>) -> Self {
        self.flush();
        self.elements.push(CardElement::Div {
            text: Some(labelled(label, value)),
            fields: Vec::new(),
        });
        self
    }

    pub fn divider(mut self) -> Self {
        self.flush();
        self.elements.push(CardElement::Hr);
        self
    }

    pub fn note(mut self, text: impl Into<String>) -> Self {
        self.flush();
        self.elements.push(CardElement::Note {
            elements: vec![CardText::Plain {
                content: text.into(),
            }],
        });
        self
    }

    pub fn build(mut self) -> LarkMessage {
        self.flush();
        LarkMessage {
            msg_type: "interactive",
            card: Card {
                config: CardConfig {
                    wide_screen_mode: true,
                },
                header: self.header,
                elements: self.elements,
            },
        }
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.elements.push(CardElement::Div {
                text: None,
                fields: std::mem::take(&mut self.pending),
            });
        }
    }
}

fn labelled(label: &str, value: Option<&str>) -> CardText {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(escape_md)
        .unwrap_or_else(|| "-".to_string());
    CardText::Markdown {
        content: format!("**{label}**\n{value}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_card_serializes_to_lark_shape() {
        let message = CardBuilder::new("新しい応募", HeaderColor::Blue)
            .field("氏名", Some("山田 太郎"))
            .field("電話番号", None)
            .divider()
            .note("RIDE JOB")
            .build();

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["msg_type"], "interactive");
        assert_eq!(value["card"]["header"]["template"], "blue");
        assert_eq!(
            value["card"]["header"]["title"],
            json!({"tag": "plain_text", "content": "新しい応募"})
        );

        let elements = value["card"]["elements"].as_array().unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0]["tag"], "div");
        assert!(elements[0].get("text").is_none());
        assert_eq!(
            elements[0]["fields"][0]["text"],
            json!({"tag": "lark_md", "content": "**氏名**\n山田 太郎"})
        );
        assert_eq!(
            elements[0]["fields"][1]["text"]["content"],
            "**電話番号**\n-"
        );
        assert_eq!(elements[1], json!({"tag": "hr"}));
        assert_eq!(elements[2]["tag"], "note");
    }

    #[test]
    fn test_long_field_splits_short_groups() {
        let message = CardBuilder::new("t", HeaderColor::Orange)
            .field("a", Some("1"))
            .long_field("メッセージ", Some("よろしくお願いします"))
            .field("b", Some("2"))
            .build();
        assert_eq!(message.card.elements.len(), 3);
    }

    #[test]
    fn test_user_values_are_escaped() {
        assert_eq!(escape_md("*bold* [link](x)"), "\\*bold\\* \\[link\\](x)");
        let message = CardBuilder::new("t", HeaderColor::Blue)
            .field("name", Some("<at id=all></at>"))
            .build();
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value["card"]["elements"][0]["fields"][0]["text"]["content"],
            "**name**\n\\<at id=all\\>\\</at\\>"
        );
    }
}
