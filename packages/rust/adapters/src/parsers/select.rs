//! Item-list parser driven by CSS selectors.
//!
//! Each element matched by the item selector becomes one JSON object whose
//! keys are the configured field names. An optional "next page" selector
//! feeds pagination.

use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value, json};
use url::Url;

use ladle_core::Parser;
use ladle_shared::{FieldSpec, LadleError, RawContent, Result, StructuredContent};

use crate::html::{base_url, compile_selector, element_text, resolve_href};

/// How one named field is read from an item element.
pub struct FieldRule {
    name: String,
    /// `None` reads the item element itself.
    selector: Option<Selector>,
    attr: Option<String>,
    optional: bool,
}

impl FieldRule {
    pub fn from_spec(name: impl Into<String>, spec: &FieldSpec) -> Result<Self> {
        let selector = match spec.selector.trim() {
            "" => None,
            s => Some(compile_selector(s)?),
        };
        Ok(Self {
            name: name.into(),
            selector,
            attr: spec.attr.clone(),
            optional: spec.optional,
        })
    }

    fn extract(&self, item: &ElementRef<'_>, base: Option<&Url>) -> Option<String> {
        let el = match &self.selector {
            Some(sel) => item.select(sel).next()?,
            None => *item,
        };
        match self.attr.as_deref() {
            Some(attr @ ("href" | "src")) => resolve_href(base, el.value().attr(attr)?),
            Some(attr) => el.value().attr(attr).map(str::to_string),
            None => Some(element_text(&el)),
        }
    }
}

/// Produces `{"items": [{field: value, ..}], "next": url | null}`.
pub struct SelectParser {
    schema_type: String,
    item_selector: Selector,
    fields: Vec<FieldRule>,
    next_selector: Option<Selector>,
}

impl SelectParser {
    pub fn new(
        schema_type: impl Into<String>,
        item_selector: &str,
        fields: Vec<FieldRule>,
        next_selector: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            schema_type: schema_type.into(),
            item_selector: compile_selector(item_selector)?,
            fields,
            next_selector: next_selector.map(compile_selector).transpose()?,
        })
    }

    fn next_link(&self, doc: &Html, base: Option<&Url>) -> Option<String> {
        let sel = self.next_selector.as_ref()?;
        doc.select(sel)
            .filter_map(|el| el.value().attr("href"))
            .find_map(|href| resolve_href(base, href))
    }
}

impl Parser for SelectParser {
    fn parse(&self, raw: &RawContent) -> Result<StructuredContent> {
        let doc = Html::parse_document(&raw.body);
        let base = base_url(&raw.source.location);

        let mut items = Vec::new();
        for (index, item) in doc.select(&self.item_selector).enumerate() {
            let mut record = Map::new();
            for field in &self.fields {
                let value = match field.extract(&item, base.as_ref()) {
                    Some(value) => Value::String(value),
                    None if field.optional => Value::Null,
                    None => {
                        return Err(LadleError::parse(
                            &raw.source.location,
                            format!("item {index}: required field '{}' not found", field.name),
                        ));
                    }
                };
                record.insert(field.name.clone(), value);
            }
            items.push(Value::Object(record));
        }

        let next = self.next_link(&doc, base.as_ref());

        Ok(StructuredContent::new(
            raw.source.clone(),
            self.schema_type.clone(),
            json!({ "items": items, "next": next }),
        ))
    }

    fn name(&self) -> &str {
        "html-select"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ladle_shared::SourceReference;

    fn fixture_path(name: &str) -> std::path::PathBuf {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/html")
            .join(name)
    }

    fn load(name: &str, location: &str, page_type: &str) -> RawContent {
        RawContent {
            source: SourceReference::new(location, page_type),
            body: std::fs::read_to_string(fixture_path(name))
                .unwrap_or_else(|e| panic!("failed to read fixture {name}: {e}")),
        }
    }

    fn field(selector: &str, attr: Option<&str>, optional: bool) -> FieldSpec {
        FieldSpec {
            selector: selector.into(),
            attr: attr.map(str::to_string),
            optional,
        }
    }

    fn cocktail_list_parser(category_optional: bool) -> SelectParser {
        let fields = vec![
            FieldRule::from_spec("name", &field("a.title", None, false)).unwrap(),
            FieldRule::from_spec("url", &field("a.title", Some("href"), false)).unwrap(),
            FieldRule::from_spec("category", &field(".category", None, category_optional))
                .unwrap(),
        ];
        SelectParser::new("cocktails", "div.cocktail", fields, Some("a.next")).unwrap()
    }

    #[test]
    fn extracts_items_and_next_page() {
        let raw = load("list.html", "https://example.com/cocktails/", "list");
        let parsed = cocktail_list_parser(true).parse(&raw).unwrap();

        assert_eq!(parsed.schema_type, "cocktails");
        assert_eq!(
            parsed.payload,
            json!({
                "items": [
                    {
                        "name": "Negroni",
                        "url": "https://example.com/cocktails/negroni/",
                        "category": "The Unforgettables"
                    },
                    {
                        "name": "Daiquiri",
                        "url": "https://example.com/cocktails/daiquiri/",
                        "category": "Contemporary Classics"
                    },
                    {
                        "name": "Spritz",
                        "url": "https://other.example.org/cocktails/spritz/",
                        "category": null
                    }
                ],
                "next": "https://example.com/cocktails/page/2/"
            })
        );
    }

    #[test]
    fn missing_required_field_fails_the_parse() {
        let raw = load("list.html", "https://example.com/cocktails/", "list");
        let err = cocktail_list_parser(false).parse(&raw).unwrap_err();
        match err {
            LadleError::Parse { message, .. } => {
                assert!(message.contains("item 2"));
                assert!(message.contains("'category'"));
            }
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn detail_page_resolves_relative_sources() {
        let raw = load(
            "detail.html",
            "https://example.com/cocktails/negroni/",
            "detail",
        );
        let fields = vec![
            FieldRule::from_spec("name", &field("h1", None, false)).unwrap(),
            FieldRule::from_spec("photo", &field("img.photo", Some("src"), false)).unwrap(),
            FieldRule::from_spec("alt", &field("img.photo", Some("alt"), false)).unwrap(),
            FieldRule::from_spec("method", &field("p.method", None, false)).unwrap(),
        ];
        let parser = SelectParser::new("recipe", "article.recipe", fields, None).unwrap();

        let parsed = parser.parse(&raw).unwrap();
        let item = &parsed.payload["items"][0];
        assert_eq!(item["name"], "Negroni");
        assert_eq!(item["photo"], "https://example.com/images/negroni.jpg");
        assert_eq!(item["alt"], "Negroni");
        assert!(item["method"].as_str().unwrap().starts_with("Pour all ingredients"));
        assert_eq!(parsed.payload["next"], Value::Null);
    }

    #[test]
    fn empty_field_selector_reads_the_item() {
        let raw = load(
            "detail.html",
            "https://example.com/cocktails/negroni/",
            "detail",
        );
        let fields = vec![FieldRule::from_spec("ingredient", &field("", None, false)).unwrap()];
        let parser = SelectParser::new("ingredients", "ul.ingredients li", fields, None).unwrap();

        let parsed = parser.parse(&raw).unwrap();
        let names: Vec<&str> = parsed.payload["items"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|i| i["ingredient"].as_str())
            .collect();
        assert_eq!(
            names,
            vec!["30 ml Gin", "30 ml Bitter Campari", "30 ml Sweet Red Vermouth"]
        );
    }
}
