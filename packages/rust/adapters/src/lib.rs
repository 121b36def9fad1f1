//! Built-in, configuration-driven parsers and transformers.
//!
//! This crate provides:
//! - [`parsers`]: `html-links`, `html-select`, and `json` parsers
//! - [`transformers`]: `follow` and `split` transformers
//! - [`Catalog`]: registers both from an [`AppConfig`](ladle_shared::AppConfig)

mod catalog;
mod html;
pub mod parsers;
pub mod transformers;

pub use catalog::Catalog;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ladle_core::{FailureKind, Pipeline, SilentProgress};
    use ladle_fetcher::{Fetcher, WebSource};
    use ladle_shared::{AppConfig, ReadSource, SourceReference};
    use ladle_storage::ContentStore;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LIST_PAGE: &str = r#"<html><body>
        <div class="cocktail"><a class="title" href="/cocktails/negroni">Negroni</a></div>
        <div class="cocktail"><a class="title" href="/cocktails/spritz">Spritz</a></div>
        <div class="cocktail"><a class="title" href="/cocktails/gone">Gone</a></div>
        <a class="next" href="/list/2">Next</a>
    </body></html>"#;

    const LAST_PAGE: &str = r#"<html><body>
        <div class="cocktail"><a class="title" href="/cocktails/negroni">Negroni</a></div>
    </body></html>"#;

    fn config(root: &std::path::Path, server: &MockServer) -> AppConfig {
        let text = format!(
            r#"
[policy]
html_root_dir = "{html}"
json_root_dir = "{json}"
read_order = ["file", "web"]
write_contents = true

[run]
fetch_timeout_secs = 5

[[entrypoints]]
url = "{base}/list/1"
page_type = "list"

[parsers.list]
kind = "html-select"
schema_type = "cocktails"
item_selector = "div.cocktail"
next_selector = "a.next"

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
"#,
            html = root.join("html").display(),
            json = root.join("json").display(),
            base = server.uri(),
        );
        toml::from_str(&text).unwrap()
    }

    async fn mount(server: &MockServer, at: &str, body: &str, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn paginated_list_to_detail_records() {
        let server = MockServer::start().await;
        mount(&server, "/list/1", LIST_PAGE, 1).await;
        mount(&server, "/list/2", LAST_PAGE, 1).await;
        mount(&server, "/cocktails/negroni", r#"{"name": "Negroni"}"#, 1).await;
        mount(&server, "/cocktails/spritz", r#"{"name": "Spritz"}"#, 1).await;
        Mock::given(method("GET"))
            .and(path("/cocktails/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let root = std::env::temp_dir().join(format!("ladle-e2e-test-{}", Uuid::now_v7()));
        let config = config(&root, &server);
        let (parsers, transformers) = Catalog::build(&config).unwrap();
        let store = Arc::new(ContentStore::from_config(&config.policy).unwrap());
        let fetcher = Fetcher::new(store.clone(), Arc::new(WebSource::new().unwrap()));
        let pipeline = Pipeline::from_config(&config, fetcher, parsers, transformers).unwrap();

        let report = pipeline
            .run(config.entrypoint_refs(), &SilentProgress)
            .await
            .unwrap();

        let names: Vec<_> = report.outputs.iter().map(|o| o.payload.clone()).collect();
        assert_eq!(names, vec![json!({"name": "Negroni"}), json!({"name": "Spritz"})]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, FailureKind::Fetch);
        assert!(report.failures[0].reference.location.ends_with("/cocktails/gone"));

        // Raw pages were cached under the raw root.
        let cached = store
            .read_raw(
                &SourceReference::new(format!("{}/list/1", server.uri()), "list"),
                &[ReadSource::File],
            )
            .unwrap()
            .unwrap();
        assert_eq!(cached.body, LIST_PAGE);

        let _ = std::fs::remove_dir_all(&root);
    }
}
