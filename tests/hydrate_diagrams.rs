use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use markdownlite::{
    DiagramContainer, DiagramHydrator, DiagramRenderError, DiagramRenderer, HtmlContainer,
    HydrateOptions, HydrationReport, RenderGeneration, RenderedDiagram, render_markdown_to_html,
};

type Hook = Box<dyn Fn() + Send + Sync>;

/// Renderer double that records every call and fails on chosen sources.
#[derive(Default)]
struct ScriptedRenderer {
    calls: Mutex<Vec<(String, String)>>,
    failing: Vec<String>,
    bare_markup: bool,
    during_render: Option<Hook>,
}

impl ScriptedRenderer {
    fn failing_on(sources: &[&str]) -> Self {
        Self {
            failing: sources.iter().map(|source| source.to_string()).collect(),
            ..Self::default()
        }
    }

    fn with_hook(hook: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            during_render: Some(Box::new(hook)),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn sources(&self) -> Vec<String> {
        self.calls().into_iter().map(|(_, source)| source).collect()
    }
}

#[async_trait]
impl DiagramRenderer for ScriptedRenderer {
    async fn render(&self, id: &str, source: &str) -> Result<RenderedDiagram, DiagramRenderError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((id.to_string(), source.to_string()));
        tokio::task::yield_now().await;

        if let Some(hook) = self.during_render.as_ref() {
            hook();
        }

        if self.failing.iter().any(|failing| failing == source) {
            return Err(DiagramRenderError::syntax(format!(
                "Parse error on line 1: <{source}>"
            )));
        }

        let svg = format!("<svg data-source=\"{}\"></svg>", source.len());
        if self.bare_markup {
            Ok(RenderedDiagram::from(svg))
        } else {
            Ok(RenderedDiagram::svg(svg))
        }
    }
}

fn placeholder(encoded: &str, line: u32) -> String {
    format!(r#"<div class="mermaid" data-mermaid-code="{encoded}" data-line="{line}"></div>"#)
}

fn three_placeholders() -> String {
    [
        placeholder("graph%20A", 1),
        placeholder("graph%20B", 2),
        placeholder("graph%20C", 3),
    ]
    .concat()
}

fn hydrator(renderer: &Arc<ScriptedRenderer>) -> DiagramHydrator {
    DiagramHydrator::new(Arc::clone(renderer) as Arc<dyn DiagramRenderer>)
}

#[tokio::test]
async fn failing_diagram_only_affects_its_own_placeholder() {
    let renderer = Arc::new(ScriptedRenderer::failing_on(&["graph B"]));
    let container = HtmlContainer::new(three_placeholders());

    let report = hydrator(&renderer)
        .hydrate(Some(&container), HydrateOptions::new().with_render_id(7))
        .await;

    assert_eq!(
        report,
        HydrationReport {
            discovered: 3,
            rendered: 2,
            failed: 1,
            skipped: 0,
            abandoned: false,
        }
    );
    assert_eq!(renderer.sources(), vec!["graph A", "graph B", "graph C"]);

    let html = container.html();
    assert_eq!(html.matches(r#"data-processed="true""#).count(), 3, "{html}");
    assert_eq!(html.matches("<svg").count(), 2, "{html}");
    assert!(html.contains(r#"class="mermaid mermaid-error""#), "{html}");
    assert!(html.contains(r#"data-error="true""#), "{html}");
    assert!(html.contains("Mermaid rendering error"), "{html}");
    assert!(
        html.contains("Parse error on line 1: &lt;graph B&gt;"),
        "message must be escaped: {html}"
    );
    assert!(container.pending_placeholders().is_empty());
}

#[tokio::test]
async fn placeholders_are_processed_in_document_order() {
    let renderer = Arc::new(ScriptedRenderer::default());
    let container = HtmlContainer::new(three_placeholders());

    hydrator(&renderer)
        .hydrate(Some(&container), HydrateOptions::new())
        .await;

    let html = container.html();
    let ids: Vec<String> = renderer.calls().into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids.len(), 3);
    assert!(ids[0].ends_with("-0-0"), "{ids:?}");
    assert!(ids[1].ends_with("-1-0"), "{ids:?}");
    assert!(ids[2].ends_with("-2-0"), "{ids:?}");

    let positions: Vec<usize> = ids
        .iter()
        .map(|id| html.find(&format!(r#"id="{id}""#)).expect("id in container"))
        .collect();
    assert!(positions[0] < positions[1] && positions[1] < positions[2], "{html}");
}

#[tokio::test]
async fn element_id_embeds_timestamp_index_and_render_id() {
    let renderer = Arc::new(ScriptedRenderer::default());
    let container = HtmlContainer::new(placeholder("graph%20A", 1));

    hydrator(&renderer)
        .hydrate(Some(&container), HydrateOptions::new().with_render_id(42))
        .await;

    let (id, _) = renderer.calls().remove(0);
    let parts: Vec<&str> = id.split('-').collect();
    assert_eq!(parts.len(), 4, "{id}");
    assert_eq!(parts[0], "mermaid");
    assert!(parts[1].parse::<u128>().expect("millis") > 0);
    assert_eq!(parts[2], "0");
    assert_eq!(parts[3], "42");
    assert!(container.html().contains(&format!(r#"id="{id}""#)));
}

#[tokio::test]
async fn stale_pass_never_calls_the_renderer() {
    let renderer = Arc::new(ScriptedRenderer::default());
    let original = three_placeholders();
    let container = HtmlContainer::new(original.clone());
    let always_stale = || true;

    let report = hydrator(&renderer)
        .hydrate(
            Some(&container),
            HydrateOptions::new().with_staleness(&always_stale),
        )
        .await;

    assert!(report.abandoned);
    assert!(renderer.calls().is_empty());
    assert_eq!(container.html(), original);
}

#[tokio::test]
async fn result_arriving_after_staleness_is_discarded() {
    let stale = Arc::new(AtomicBool::new(false));
    let renderer = Arc::new(ScriptedRenderer::with_hook({
        let stale = Arc::clone(&stale);
        move || stale.store(true, Ordering::SeqCst)
    }));
    let original = three_placeholders();
    let container = HtmlContainer::new(original.clone());
    let is_stale = {
        let stale = Arc::clone(&stale);
        move || stale.load(Ordering::SeqCst)
    };

    let report = hydrator(&renderer)
        .hydrate(Some(&container), HydrateOptions::new().with_staleness(&is_stale))
        .await;

    assert!(report.abandoned);
    assert_eq!(report.rendered, 0);
    assert_eq!(renderer.calls().len(), 1);
    assert_eq!(container.html(), original);
}

#[tokio::test]
async fn newer_render_generation_abandons_older_pass() {
    let generation = RenderGeneration::new();
    let render_id = generation.begin();
    let renderer = Arc::new(ScriptedRenderer::with_hook({
        let generation = generation.clone();
        move || {
            generation.begin();
        }
    }));
    let container = HtmlContainer::new(three_placeholders());
    let is_stale = generation.staleness(render_id);

    let report = hydrator(&renderer)
        .hydrate(
            Some(&container),
            HydrateOptions::new()
                .with_render_id(render_id)
                .with_staleness(&is_stale),
        )
        .await;

    assert!(report.abandoned);
    assert_eq!(renderer.calls().len(), 1);
    assert!(!generation.is_current(render_id));
    assert_eq!(container.pending_placeholders().len(), 3);
}

#[tokio::test]
async fn processed_and_sourceless_placeholders_are_left_alone() {
    let renderer = Arc::new(ScriptedRenderer::default());
    let done = r#"<div class="mermaid" data-mermaid-code="graph%20A" data-processed="true"><svg>old</svg></div>"#;
    let missing = r#"<div class="mermaid" data-line="2"></div>"#;
    let empty = r#"<div class="mermaid" data-mermaid-code="" data-line="3"></div>"#;
    let container = HtmlContainer::new(format!(
        "{done}{missing}{empty}{}",
        placeholder("graph%20D", 4)
    ));

    let report = hydrator(&renderer)
        .hydrate(Some(&container), HydrateOptions::new())
        .await;

    assert_eq!(report.discovered, 3);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.rendered, 1);
    assert_eq!(renderer.sources(), vec!["graph D"]);

    let html = container.html();
    assert!(html.contains("<svg>old</svg>"));
    assert!(html.contains(missing), "{html}");
    assert!(html.contains(empty), "{html}");
}

#[tokio::test]
async fn malformed_encoding_is_rendered_as_is() {
    let renderer = Arc::new(ScriptedRenderer::default());
    let container = HtmlContainer::new(placeholder("%E0%A4%A", 1));

    let report = hydrator(&renderer)
        .hydrate(Some(&container), HydrateOptions::new())
        .await;

    assert_eq!(report.rendered, 1);
    assert_eq!(renderer.sources(), vec!["%E0%A4%A"]);
    assert!(container.html().contains(r#"data-processed="true""#));
}

#[tokio::test]
async fn entity_escaped_source_is_unescaped_before_rendering() {
    let renderer = Arc::new(ScriptedRenderer::default());
    let container = HtmlContainer::new(placeholder(
        "%20A%20--%26gt%3B%20B%20%26amp%3B%20%26quot%3Bc%26quot%3B%20",
        1,
    ));

    hydrator(&renderer)
        .hydrate(Some(&container), HydrateOptions::new())
        .await;

    assert_eq!(renderer.sources(), vec![r#"A --> B & "c""#]);
}

#[tokio::test]
async fn bare_markup_payload_is_inserted() {
    let renderer = Arc::new(ScriptedRenderer {
        bare_markup: true,
        ..ScriptedRenderer::default()
    });
    let container = HtmlContainer::new(placeholder("graph%20A", 1));

    hydrator(&renderer)
        .hydrate(Some(&container), HydrateOptions::new())
        .await;

    assert!(container.html().contains(r#"<svg data-source="7"></svg>"#));
}

#[tokio::test]
async fn placeholder_removed_mid_render_is_skipped() {
    let container = Arc::new(HtmlContainer::new(three_placeholders()));
    let renderer = Arc::new(ScriptedRenderer::with_hook({
        let container = Arc::clone(&container);
        move || container.replace(r#"<p data-line="1">edited</p>"#)
    }));

    let report = hydrator(&renderer)
        .hydrate(Some(&*container), HydrateOptions::new())
        .await;

    assert_eq!(report.skipped, 3);
    assert_eq!(report.rendered, 0);
    assert_eq!(container.html(), r#"<p data-line="1">edited</p>"#);
}

#[tokio::test]
async fn missing_container_or_renderer_does_nothing() {
    let renderer = Arc::new(ScriptedRenderer::default());
    let report = hydrator(&renderer).hydrate(None, HydrateOptions::new()).await;
    assert_eq!(report, HydrationReport::default());
    assert!(renderer.calls().is_empty());

    let original = three_placeholders();
    let container = HtmlContainer::new(original.clone());
    let report = DiagramHydrator::default()
        .hydrate(Some(&container), HydrateOptions::new())
        .await;
    assert_eq!(report, HydrationReport::default());
    assert_eq!(container.html(), original);
}

#[tokio::test]
async fn hydrates_rendered_markdown_end_to_end() {
    let html = render_markdown_to_html(
        "# Flow\n\n```mermaid\ngraph TD\n  A-->B\n```\n\nbetween\n\n```mermaid\nbroken\n```",
    );
    let container = HtmlContainer::new(html);
    let renderer = Arc::new(ScriptedRenderer::failing_on(&["broken"]));

    let report = hydrator(&renderer)
        .hydrate(Some(&container), HydrateOptions::new().with_render_id(1))
        .await;

    assert_eq!(report.discovered, 2);
    assert_eq!(report.rendered, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(renderer.sources(), vec!["graph TD\n  A-->B", "broken"]);

    let hydrated = container.html();
    assert!(hydrated.contains(r#"<h1 data-line="1">Flow</h1>"#), "{hydrated}");
    assert!(hydrated.contains(r#"data-line="2""#), "{hydrated}");
    assert!(hydrated.contains(r#"<p data-line="4">between</p>"#), "{hydrated}");
    assert!(container.pending_placeholders().is_empty());
}

#[tokio::test]
async fn second_pass_over_hydrated_container_is_a_no_op() {
    let renderer = Arc::new(ScriptedRenderer::default());
    let container = HtmlContainer::new(three_placeholders());
    let hydrator = hydrator(&renderer);

    hydrator.hydrate(Some(&container), HydrateOptions::new()).await;
    let after_first = container.html();
    let report = hydrator.hydrate(Some(&container), HydrateOptions::new()).await;

    assert_eq!(report.discovered, 0);
    assert_eq!(renderer.calls().len(), 3);
    assert_eq!(container.html(), after_first);
}

#[tokio::test]
async fn superseded_pass_yields_to_the_latest_one() {
    let generation = RenderGeneration::new();
    let older = generation.begin();
    let newer = generation.begin();
    let renderer = Arc::new(ScriptedRenderer::default());
    let container = HtmlContainer::new(three_placeholders());
    let hydrator = hydrator(&renderer);
    let older_stale = generation.staleness(older);
    let newer_stale = generation.staleness(newer);

    let (older_report, newer_report) = futures::future::join(
        hydrator.hydrate(
            Some(&container),
            HydrateOptions::new()
                .with_render_id(older)
                .with_staleness(&older_stale),
        ),
        hydrator.hydrate(
            Some(&container),
            HydrateOptions::new()
                .with_render_id(newer)
                .with_staleness(&newer_stale),
        ),
    )
    .await;

    assert!(older_report.abandoned);
    assert!(!newer_report.abandoned);
    assert_eq!(newer_report.rendered, 3);
    assert!(
        renderer
            .calls()
            .iter()
            .all(|(id, _)| id.ends_with(&format!("-{newer}")))
    );
    assert!(container.pending_placeholders().is_empty());
}
