//! Function-call results attached to assistant replies
//!
//! The assistant reports side effects (book recommendations, title searches,
//! content fetches) as named function results. The wire payload is not
//! self-describing about its schema version: the current encoding puts an
//! array directly in `result`, while older replies nest the same data under
//! `result.recommended_books` / `result.matched_books` or even under the
//! echoed `arguments`. Parsing tries the current encoding first, then the
//! legacy ones, and falls back to an explicit [`FunctionResult::NoContent`]
//! rather than rendering nothing for unclear reasons.

use serde::Deserialize;
use serde_json::Value;

/// Wire name of the recommendation function
pub const FN_RECOMMEND: &str = "recommend_books";
/// Wire name of the title-search function
pub const FN_SEARCH: &str = "search_book_by_title";
/// Wire name of the content-fetch function
pub const FN_CONTENT: &str = "get_book_content";

/// A function result as it appears on the wire, before schema resolution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFunctionResult {
    /// Function name (`recommend_books`, `search_book_by_title`, `get_book_content`)
    #[serde(default)]
    pub name: String,
    /// Result payload; shape depends on name and schema vintage
    #[serde(default)]
    pub result: Option<Value>,
    /// Arguments echoed from the request (legacy encodings nest data here)
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// A recommended book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendedBook {
    pub book_id: String,
    pub book_title: String,
    pub reason: Option<String>,
}

/// A title-search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedBook {
    pub book_id: String,
    pub book_title: String,
    pub description: Option<String>,
}

/// A parsed function result, tagged per function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionResult {
    /// `recommend_books`
    Recommendation {
        summary: Option<String>,
        books: Vec<RecommendedBook>,
    },
    /// `search_book_by_title`
    Search { books: Vec<MatchedBook> },
    /// `get_book_content`
    ContentFetch {
        status: String,
        book_id: String,
        book_title: String,
    },
    /// Unknown name or unparseable payload; kept so the UI can say so
    NoContent { name: String },
}

impl FunctionResult {
    /// Resolve a raw wire result into its tagged variant.
    pub fn parse(raw: &RawFunctionResult) -> Self {
        match raw.name.as_str() {
            FN_RECOMMEND => parse_recommendation(raw),
            FN_SEARCH => parse_search(raw),
            FN_CONTENT => parse_content_fetch(raw),
            _ => Self::no_content(raw),
        }
    }

    fn no_content(raw: &RawFunctionResult) -> Self {
        tracing::debug!(name = %raw.name, "function result had no renderable content");
        FunctionResult::NoContent {
            name: raw.name.clone(),
        }
    }

    /// True for a `get_book_content` result with success status.
    pub fn is_successful_content_fetch(&self) -> bool {
        matches!(self, FunctionResult::ContentFetch { status, .. } if status == "success")
    }
}

/// Book ids arrive as JSON strings or numbers; normalize both to `String`.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn recommended_book(obj: &Value) -> Option<RecommendedBook> {
    Some(RecommendedBook {
        book_id: obj.get("book_id").and_then(id_string)?,
        book_title: str_field(obj, "book_title")?,
        reason: str_field(obj, "reason"),
    })
}

fn matched_book(obj: &Value) -> Option<MatchedBook> {
    Some(MatchedBook {
        book_id: obj.get("book_id").and_then(id_string)?,
        book_title: str_field(obj, "book_title")?,
        // The original server spells this key inconsistently
        description: str_field(obj, "book_description").or_else(|| str_field(obj, "book_Description")),
    })
}

fn book_array<T>(value: &Value, parse_one: impl Fn(&Value) -> Option<T>) -> Option<Vec<T>> {
    let items = value.as_array()?;
    let books: Vec<T> = items.iter().filter_map(&parse_one).collect();
    if books.is_empty() {
        None
    } else {
        Some(books)
    }
}

fn parse_recommendation(raw: &RawFunctionResult) -> FunctionResult {
    // Current: result is a direct array
    if let Some(result) = &raw.result {
        if let Some(books) = book_array(result, recommended_book) {
            return FunctionResult::Recommendation {
                summary: None,
                books,
            };
        }
        // Middle vintage: nested under result.recommended_books
        if let Some(nested) = result.get("recommended_books") {
            if let Some(books) = book_array(nested, recommended_book) {
                return FunctionResult::Recommendation {
                    summary: str_field(result, "recommendation_summary"),
                    books,
                };
            }
        }
    }
    // Legacy: nested under the echoed arguments
    if let Some(args) = &raw.arguments {
        if let Some(nested) = args.get("recommended_books") {
            if let Some(books) = book_array(nested, recommended_book) {
                return FunctionResult::Recommendation {
                    summary: str_field(args, "recommendation_summary"),
                    books,
                };
            }
        }
    }
    FunctionResult::no_content(raw)
}

fn parse_search(raw: &RawFunctionResult) -> FunctionResult {
    if let Some(result) = &raw.result {
        // Current: result is a direct array
        if let Some(books) = book_array(result, matched_book) {
            return FunctionResult::Search { books };
        }
        // Legacy: nested under result.matched_books
        if let Some(nested) = result.get("matched_books") {
            if let Some(books) = book_array(nested, matched_book) {
                return FunctionResult::Search { books };
            }
        }
    }
    FunctionResult::no_content(raw)
}

fn parse_content_fetch(raw: &RawFunctionResult) -> FunctionResult {
    if let Some(result) = &raw.result {
        if let (Some(status), Some(book_id), Some(book_title)) = (
            str_field(result, "status"),
            result.get("book_id").and_then(id_string),
            str_field(result, "book_title"),
        ) {
            return FunctionResult::ContentFetch {
                status,
                book_id,
                book_title,
            };
        }
    }
    FunctionResult::no_content(raw)
}
