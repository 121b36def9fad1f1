//! Builds the parser and transformer registries from configuration.

use tracing::{info, warn};

use ladle_core::{ParserRegistry, TransformerRegistry};
use ladle_shared::{AppConfig, ParserSpec, Result, TransformerKind, TransformerSpec};

use crate::parsers::{FieldRule, JsonParser, LinksParser, SelectParser};
use crate::transformers::{FollowTransformer, SplitTransformer};

/// Maps `[parsers.*]` and `[[transformers]]` entries to built-in adapters.
pub struct Catalog;

impl Catalog {
    /// Instantiate every configured adapter.
    ///
    /// Invalid selectors or glob patterns are configuration errors. Transformers
    /// are registered in file order, which fixes the fan-out order.
    pub fn build(config: &AppConfig) -> Result<(ParserRegistry, TransformerRegistry)> {
        let mut parsers = ParserRegistry::new();
        for (page_type, spec) in &config.parsers {
            register_parser(&mut parsers, page_type, spec)?;
        }

        let mut transformers = TransformerRegistry::new();
        for spec in &config.transformers {
            register_transformer(&mut transformers, spec)?;
            if parsers.resolve(&spec.page_type).is_err() {
                warn!(
                    page_type = %spec.page_type,
                    "transformer registered for a page type without a parser"
                );
            }
            if let TransformerKind::Follow {
                target_page_type, ..
            } = &spec.kind
            {
                if parsers.resolve(target_page_type).is_err() {
                    warn!(
                        %target_page_type,
                        "follow target has no parser; its fetches will fail as unregistered"
                    );
                }
            }
        }

        info!(
            parsers = parsers.len(),
            transformers = transformers.len(),
            "adapter catalog built"
        );
        Ok((parsers, transformers))
    }
}

fn register_parser(
    registry: &mut ParserRegistry,
    page_type: &str,
    spec: &ParserSpec,
) -> Result<()> {
    match spec {
        ParserSpec::HtmlLinks {
            schema_type,
            selector,
        } => registry.register(
            page_type,
            LinksParser::new(schema_type.clone(), selector.as_deref())?,
        ),
        ParserSpec::HtmlSelect {
            schema_type,
            item_selector,
            fields,
            next_selector,
        } => {
            let rules = fields
                .iter()
                .map(|(name, field)| FieldRule::from_spec(name.clone(), field))
                .collect::<Result<Vec<_>>>()?;
            registry.register(
                page_type,
                SelectParser::new(
                    schema_type.clone(),
                    item_selector,
                    rules,
                    next_selector.as_deref(),
                )?,
            );
        }
        ParserSpec::Json { schema_type } => {
            registry.register(page_type, JsonParser::new(schema_type.clone()))
        }
    }
    Ok(())
}

fn register_transformer(
    registry: &mut TransformerRegistry,
    spec: &TransformerSpec,
) -> Result<()> {
    match &spec.kind {
        TransformerKind::Follow {
            pointer,
            field,
            target_page_type,
            include,
            exclude,
            policy,
        } => {
            let follow = FollowTransformer::new(pointer.clone(), target_page_type.clone())
                .with_field(field.clone())
                .with_patterns(include, exclude)?
                .with_policy(policy.clone());
            registry.register(spec.page_type.clone(), spec.schema_type.clone(), follow);
        }
        TransformerKind::Split {
            pointer,
            target_schema_type,
        } => registry.register(
            spec.page_type.clone(),
            spec.schema_type.clone(),
            SplitTransformer::new(pointer.clone(), target_schema_type.clone()),
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ladle_core::{Parser, Transformer};
    use ladle_shared::{LadleError, PipelineOutput, RawContent, SourceReference};

    const CONFIG: &str = r#"
[[entrypoints]]
url = "https://example.com/cocktails/"
page_type = "list"

[parsers.list]
kind = "html-select"
schema_type = "cocktails"
item_selector = "div.cocktail"
next_selector = "a.next"

[parsers.list.fields.name]
selector = "a.title"

[parsers.list.fields.url]
selector = "a.title"
attr = "href"

[parsers.detail]
kind = "json"
schema_type = "recipe"

[[transformers]]
page_type = "list"
schema_type = "cocktails"
kind = "follow"
pointer = "/items"
field = "url"
target_page_type = "detail"

[[transformers]]
page_type = "list"
schema_type = "cocktails"
kind = "follow"
pointer = "/next"
target_page_type = "list"

[[transformers]]
page_type = "detail"
schema_type = "recipe"
kind = "split"
pointer = "/ingredients"
target_schema_type = "ingredient"
"#;

    fn fixture_path(name: &str) -> std::path::PathBuf {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/html")
            .join(name)
    }

    #[test]
    fn builds_registries_from_config() {
        let config: AppConfig = toml::from_str(CONFIG).unwrap();
        let (parsers, transformers) = Catalog::build(&config).unwrap();

        assert_eq!(parsers.page_types(), vec!["detail", "list"]);
        assert_eq!(transformers.resolve("list", "cocktails").len(), 2);
        assert_eq!(transformers.resolve("detail", "recipe").len(), 1);
        assert!(transformers.resolve("detail", "ingredient").is_empty());
    }

    #[test]
    fn configured_adapters_chain_over_a_fixture() {
        let config: AppConfig = toml::from_str(CONFIG).unwrap();
        let (parsers, transformers) = Catalog::build(&config).unwrap();

        let raw = RawContent {
            source: SourceReference::new("https://example.com/cocktails/", "list"),
            body: std::fs::read_to_string(fixture_path("list.html")).unwrap(),
        };
        let parsed = parsers.resolve("list").unwrap().parse(&raw).unwrap();

        let mut targets = Vec::new();
        for t in transformers.resolve(&parsed.source.page_type, &parsed.schema_type) {
            for output in t.transform(&parsed).unwrap() {
                match output {
                    PipelineOutput::FetchTarget(r) => targets.push(r.to_string()),
                    other => panic!("expected FetchTarget, got {other:?}"),
                }
            }
        }

        assert_eq!(
            targets,
            vec![
                "https://example.com/cocktails/negroni/ [detail]",
                "https://example.com/cocktails/daiquiri/ [detail]",
                "https://other.example.org/cocktails/spritz/ [detail]",
                "https://example.com/cocktails/page/2/ [list]",
            ]
        );
    }

    #[test]
    fn invalid_selector_fails_the_build() {
        let config: AppConfig = toml::from_str(
            r#"
[parsers.list]
kind = "html-links"
schema_type = "links"
selector = "ul[["
"#,
        )
        .unwrap();
        let err = Catalog::build(&config).err().unwrap();
        assert!(matches!(err, LadleError::Config { .. }));
    }
}
