use std::process;

use markdownlite::{
    application::{
        diagram::{
            DiagramHydrator, DiagramPipelineConfig, HtmlContainer, HydrateOptions,
            configure_diagram_renderer,
        },
        document::{DocumentSource, FsDocumentSource},
        error::AppError,
        render::{HIGHLIGHT_CSS, RenderService, render_service},
    },
    config::{self, CliArgs, Settings},
    infra::{error::InfraError, telemetry},
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let (args, settings) = match config::load_with_cli() {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("{err}");
            process::exit(AppError::from(err).exit_code());
        }
    };

    if let Err(err) = telemetry::init(&settings.logging) {
        eprintln!("{err}");
        process::exit(1);
    }

    if let Err(err) = run(args, settings).await {
        error!(target = "render_dump", error = %err, "render_dump failed");
        process::exit(err.exit_code());
    }
}

async fn run(args: CliArgs, settings: Settings) -> Result<(), AppError> {
    let documents = FsDocumentSource::new().with_open_path(&args.input);
    let document = documents
        .open()
        .await?
        .ok_or_else(|| AppError::unexpected("no document selected"))?;

    let renderer = render_service();
    let html = if args.no_sanitize {
        renderer.render_unsanitized(&document.content)?
    } else {
        renderer.render(&document.content)?.html
    };

    let html = if args.hydrate {
        configure_diagram_renderer(DiagramPipelineConfig::from(&settings.render))
            .map_err(|err| InfraError::configuration(err.to_string()))?;

        let container = HtmlContainer::new(html);
        let hydrator = DiagramHydrator::shared();
        let report = hydrator
            .hydrate(Some(&container), HydrateOptions::new().with_render_id(1))
            .await;
        info!(
            target = "render_dump",
            available = hydrator.is_available(),
            discovered = report.discovered,
            rendered = report.rendered,
            failed = report.failed,
            skipped = report.skipped,
            "Diagram hydration finished"
        );
        container.html()
    } else {
        html
    };

    if args.standalone {
        println!(
            "<!doctype html>\n<html><head><meta charset=\"utf-8\"><style>\n{HIGHLIGHT_CSS}</style></head>\n<body>\n{html}</body></html>"
        );
    } else {
        println!("{html}");
    }

    Ok(())
}
