//! Context snippets and their markup form.
//!
//! A [`ContextSnippet`] is the typed result of resolving one reference. It
//! is rendered once, by [`ContextSnippet::to_markup`], into a
//! `<context-snippet type="…">` block that is spliced into the prompt:
//!
//! ```text
//! <context-snippet type="command_result">
//!   <command-query>!book moby dick</command-query>
//!   <result-text>Content for Moby Dick.txt: …</result-text>
//!   <source>LocalBookFile:Moby Dick.txt</source>
//! </context-snippet>
//! ```
//!
//! Field names become element names with underscores turned into hyphens.
//! Lists render as repeated `<item>` children and records as nested
//! elements. Absent optional fields are omitted.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

/// Root element name of every snippet.
pub const SNIPPET_ELEMENT: &str = "context-snippet";

/// Errors from rendering a snippet.
#[derive(Debug, thiserror::Error)]
pub enum SnippetError {
    #[error("failed to write snippet markup: {0}")]
    Write(String),

    #[error("snippet markup is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// A field value inside a snippet.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    List(Vec<FieldValue>),
    Record(Vec<(String, FieldValue)>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// Content extracted from a web page.
#[derive(Debug, Clone, PartialEq)]
pub struct WebsiteContent {
    pub url: String,
    pub text_content: String,
    pub title: Option<String>,
}

/// Outcome of a bang command, including error outcomes.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    /// The command as the user asked for it, e.g. `!book moby dick`.
    pub command_query: String,
    pub result_text: String,
    /// Where the result came from, e.g. `LocalBookDirectory`.
    pub source: String,
}

impl CommandResult {
    pub fn new(
        command_query: impl Into<String>,
        result_text: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            command_query: command_query.into(),
            result_text: result_text.into(),
            source: source.into(),
        }
    }
}

/// A unit of fetched context.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextSnippet {
    Website(WebsiteContent),
    CommandResult(CommandResult),
}

impl From<WebsiteContent> for ContextSnippet {
    fn from(content: WebsiteContent) -> Self {
        ContextSnippet::Website(content)
    }
}

impl From<CommandResult> for ContextSnippet {
    fn from(result: CommandResult) -> Self {
        ContextSnippet::CommandResult(result)
    }
}

impl ContextSnippet {
    /// Value of the `type` attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            ContextSnippet::Website(_) => "website",
            ContextSnippet::CommandResult(_) => "command_result",
        }
    }

    /// Named fields in render order. `None` values are omitted.
    pub fn fields(&self) -> Vec<(&'static str, Option<FieldValue>)> {
        match self {
            ContextSnippet::Website(w) => vec![
                ("url", Some(w.url.as_str().into())),
                ("text_content", Some(w.text_content.as_str().into())),
                ("title", w.title.as_deref().map(FieldValue::from)),
            ],
            ContextSnippet::CommandResult(c) => vec![
                ("command_query", Some(c.command_query.as_str().into())),
                ("result_text", Some(c.result_text.as_str().into())),
                ("source", Some(c.source.as_str().into())),
            ],
        }
    }

    /// Render the snippet as a pretty-printed markup block.
    pub fn to_markup(&self) -> Result<String, SnippetError> {
        let fields: Vec<(&str, FieldValue)> = self
            .fields()
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();
        render_snippet(self.kind(), &fields)
    }
}

/// Render a `context-snippet` block of the given type from raw fields.
pub fn render_snippet(kind: &str, fields: &[(&str, FieldValue)]) -> Result<String, SnippetError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    let mut root = BytesStart::new(SNIPPET_ELEMENT);
    root.push_attribute(("type", kind));
    write(&mut writer, Event::Start(root))?;
    for (name, value) in fields {
        write_field(&mut writer, &element_name(name), value)?;
    }
    write(&mut writer, Event::End(BytesEnd::new(SNIPPET_ELEMENT)))?;

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

fn element_name(field: &str) -> String {
    field.replace('_', "-")
}

fn write_field(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    value: &FieldValue,
) -> Result<(), SnippetError> {
    match value {
        FieldValue::Text(text) if text.is_empty() => {
            write(writer, Event::Empty(BytesStart::new(name)))
        }
        FieldValue::Text(text) => {
            write(writer, Event::Start(BytesStart::new(name)))?;
            write(writer, Event::Text(BytesText::from_escaped(partial_escape(text))))?;
            write(writer, Event::End(BytesEnd::new(name)))
        }
        FieldValue::List(items) if items.is_empty() => {
            write(writer, Event::Empty(BytesStart::new(name)))
        }
        FieldValue::List(items) => {
            write(writer, Event::Start(BytesStart::new(name)))?;
            for item in items {
                write_field(writer, "item", item)?;
            }
            write(writer, Event::End(BytesEnd::new(name)))
        }
        FieldValue::Record(entries) if entries.is_empty() => {
            write(writer, Event::Empty(BytesStart::new(name)))
        }
        FieldValue::Record(entries) => {
            write(writer, Event::Start(BytesStart::new(name)))?;
            for (key, inner) in entries {
                write_field(writer, &element_name(key), inner)?;
            }
            write(writer, Event::End(BytesEnd::new(name)))
        }
    }
}

fn write(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<(), SnippetError> {
    writer
        .write_event(event)
        .map_err(|e| SnippetError::Write(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_website_markup() {
        let snippet = ContextSnippet::Website(WebsiteContent {
            url: "https://example.com".to_string(),
            text_content: "Bunnies have toes.".to_string(),
            title: Some("Content from https://example.com".to_string()),
        });
        assert_eq!(
            snippet.to_markup().unwrap(),
            "<context-snippet type=\"website\">\n\
             \x20 <url>https://example.com</url>\n\
             \x20 <text-content>Bunnies have toes.</text-content>\n\
             \x20 <title>Content from https://example.com</title>\n\
             </context-snippet>"
        );
    }

    #[test]
    fn test_command_result_markup() {
        let snippet: ContextSnippet =
            CommandResult::new("!books", "Available books:\n- a.txt", "LocalBookDirectory").into();
        assert_eq!(
            snippet.to_markup().unwrap(),
            "<context-snippet type=\"command_result\">\n\
             \x20 <command-query>!books</command-query>\n\
             \x20 <result-text>Available books:\n- a.txt</result-text>\n\
             \x20 <source>LocalBookDirectory</source>\n\
             </context-snippet>"
        );
    }

    #[test]
    fn test_missing_title_is_omitted() {
        let snippet = ContextSnippet::Website(WebsiteContent {
            url: "https://example.com".to_string(),
            text_content: "text".to_string(),
            title: None,
        });
        let markup = snippet.to_markup().unwrap();
        assert!(!markup.contains("<title"));
        assert!(!markup.starts_with("<?xml"));
    }

    #[test]
    fn test_markup_text_is_escaped() {
        let snippet: ContextSnippet =
            CommandResult::new("!testcmd", "a < b && c > d", "TestCommandHandler").into();
        let markup = snippet.to_markup().unwrap();
        assert!(markup.contains("<result-text>a &lt; b &amp;&amp; c &gt; d</result-text>"));
    }

    #[test]
    fn test_quotes_are_left_readable() {
        let snippet: ContextSnippet =
            CommandResult::new("!book x", "Book matching query 'x' not found.", "src").into();
        assert!(snippet.to_markup().unwrap().contains("query 'x' not found"));
    }

    #[test]
    fn test_empty_value_renders_self_closing() {
        let snippet: ContextSnippet = CommandResult::new("!testcmd", "", "src").into();
        assert!(snippet.to_markup().unwrap().contains("  <result-text/>\n"));
    }

    #[test]
    fn test_lists_and_records_render_nested() {
        let fields = vec![
            (
                "tags",
                FieldValue::List(vec!["fiction".into(), "classic".into()]),
            ),
            (
                "meta_info",
                FieldValue::Record(vec![("page_count".to_string(), "320".into())]),
            ),
        ];
        assert_eq!(
            render_snippet("document", &fields).unwrap(),
            "<context-snippet type=\"document\">\n\
             \x20 <tags>\n\
             \x20   <item>fiction</item>\n\
             \x20   <item>classic</item>\n\
             \x20 </tags>\n\
             \x20 <meta-info>\n\
             \x20   <page-count>320</page-count>\n\
             \x20 </meta-info>\n\
             </context-snippet>"
        );
    }

    #[test]
    fn test_kinds() {
        let web = ContextSnippet::Website(WebsiteContent {
            url: String::new(),
            text_content: String::new(),
            title: None,
        });
        assert_eq!(web.kind(), "website");
        let cmd: ContextSnippet = CommandResult::new("", "", "").into();
        assert_eq!(cmd.kind(), "command_result");
    }
}
