//! Message templates.
//!
//! Moderators write templates with `{field}` placeholders; `{{` and `}}`
//! produce literal braces. Only the fields listed in [`FIELDS`] exist.
//! Fields that make no sense for the current event (e.g. `comment_body` on
//! a post) render as an empty string.

use thiserror::Error;

use crate::domain::{Comment, Community, Submission};

/// Every placeholder a template may use
pub const FIELDS: &[&str] = &[
    "author",
    "author_flair",
    "submission_id",
    "submission_title",
    "subreddit",
    "subreddit_id",
    "comment_id",
    "comment_body",
    "unflaired_message",
];

/// Errors that can occur while rendering a template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("unknown placeholder '{{{0}}}'")]
    UnknownField(String),

    #[error("unclosed '{{' at byte {0}")]
    UnclosedBrace(usize),

    #[error("single '}}' at byte {0} (use '}}}}' for a literal brace)")]
    StrayClosingBrace(usize),
}

/// Values available to a template for one event
#[derive(Debug, Clone, Default)]
pub struct MessageContext<'a> {
    pub author: Option<&'a str>,
    pub author_flair: Option<&'a str>,
    pub submission_id: Option<&'a str>,
    pub submission_title: Option<&'a str>,
    pub subreddit: Option<&'a str>,
    pub subreddit_id: Option<&'a str>,
    pub comment_id: Option<&'a str>,
    pub comment_body: Option<&'a str>,
    pub unflaired_message: Option<&'a str>,
}

impl<'a> MessageContext<'a> {
    /// Context for a new post
    pub fn for_submission(community: &'a Community, submission: &'a Submission) -> Self {
        Self {
            author: submission.author.as_deref(),
            author_flair: submission.author_flair_text.as_deref(),
            submission_id: Some(submission.id.as_str()),
            submission_title: Some(submission.title.as_str()),
            subreddit: Some(community.name.as_str()),
            subreddit_id: Some(community.id.as_str()),
            ..Default::default()
        }
    }

    /// Context for a new comment
    pub fn for_comment(community: &'a Community, comment: &'a Comment) -> Self {
        Self {
            author: comment.author.as_deref(),
            author_flair: comment.author_flair_text.as_deref(),
            subreddit: Some(community.name.as_str()),
            subreddit_id: Some(community.id.as_str()),
            comment_id: Some(comment.id.as_str()),
            comment_body: Some(comment.body.as_str()),
            ..Default::default()
        }
    }

    /// Add the (already rendered) unflaired message for the general reply
    pub fn with_unflaired_message(mut self, message: &'a str) -> Self {
        self.unflaired_message = Some(message);
        self
    }

    fn lookup(&self, field: &str) -> Result<&'a str, FormatError> {
        let value = match field {
            "author" => self.author,
            "author_flair" => self.author_flair,
            "submission_id" => self.submission_id,
            "submission_title" => self.submission_title,
            "subreddit" => self.subreddit,
            "subreddit_id" => self.subreddit_id,
            "comment_id" => self.comment_id,
            "comment_body" => self.comment_body,
            "unflaired_message" => self.unflaired_message,
            _ => return Err(FormatError::UnknownField(field.to_string())),
        };
        Ok(value.unwrap_or(""))
    }
}

/// Render a template against an event context
pub fn render(template: &str, context: &MessageContext<'_>) -> Result<String, FormatError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }

                let mut field = String::new();
                let mut closed = false;
                for (_, inner) in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    field.push(inner);
                }
                if !closed {
                    return Err(FormatError::UnclosedBrace(pos));
                }

                out.push_str(context.lookup(field.trim())?);
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(FormatError::StrayClosingBrace(pos));
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}
