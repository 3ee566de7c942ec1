use std::{
    env, fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    process::Stdio,
    time::Instant,
};

use async_trait::async_trait;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tokio::process::Command;
use tracing::{info, warn};

use super::types::{DiagramRenderError, DiagramRenderer, RenderedDiagram};

/// Diagram configuration handed to the Mermaid CLI. The palette matches the
/// dark preview chrome.
pub(crate) fn diagram_config(theme: &str) -> Value {
    json!({
        "theme": theme,
        "securityLevel": "loose",
        "fontFamily": "inherit",
        "fontSize": 12,
        "flowchart": {
            "useMaxWidth": true,
            "htmlLabels": true,
            "curve": "basis",
            "nodeSpacing": 50,
            "rankSpacing": 50,
            "padding": 15,
            "wrap": true,
            "paddingX": 20,
            "paddingY": 15
        },
        "themeVariables": {
            "fontSize": "12px",
            "fontFamily": "inherit",
            "primaryTextColor": "#d4d4d4",
            "primaryBorderColor": "#3c3c3c",
            "lineColor": "#858585",
            "secondaryColor": "#007acc",
            "tertiaryColor": "#1e1e1e",
            "nodeBkg": "#1e1e1e",
            "nodeBorder": "#3c3c3c",
            "clusterBkg": "#1e1e1e",
            "clusterBorder": "#3c3c3c",
            "defaultLinkColor": "#858585",
            "titleColor": "#d4d4d4",
            "edgeLabelBackground": "#1e1e1e",
            "actorBorder": "#3c3c3c",
            "actorBkg": "#1e1e1e",
            "actorTextColor": "#d4d4d4",
            "actorLineColor": "#858585",
            "signalColor": "#d4d4d4",
            "signalTextColor": "#d4d4d4",
            "labelBoxBkgColor": "#1e1e1e",
            "labelBoxBorderColor": "#3c3c3c",
            "labelTextColor": "#d4d4d4",
            "loopTextColor": "#d4d4d4",
            "noteBorderColor": "#3c3c3c",
            "noteBkgColor": "#1e1e1e",
            "noteTextColor": "#d4d4d4",
            "activationBorderColor": "#3c3c3c",
            "activationBkgColor": "#1e1e1e",
            "sequenceNumberColor": "#d4d4d4",
            "sectionBkgColor": "#1e1e1e",
            "altBkgColor": "#1e1e1e",
            "altBorderColor": "#3c3c3c"
        }
    })
}

/// Renders diagrams through the Mermaid CLI (`mmdc`), caching SVG output by
/// the hash of configuration and source.
#[derive(Debug, Clone)]
pub struct MermaidCliRenderer {
    cli_path: PathBuf,
    cache_dir: PathBuf,
    config_path: PathBuf,
    config_digest: String,
}

impl MermaidCliRenderer {
    pub fn new(
        cli_path: PathBuf,
        cache_dir: PathBuf,
        theme: &str,
    ) -> Result<Self, DiagramRenderError> {
        let cli_path = locate_executable(&cli_path).ok_or_else(|| {
            DiagramRenderError::NotFound(io::Error::new(
                ErrorKind::NotFound,
                format!("`{}` not found", cli_path.display()),
            ))
        })?;
        fs::create_dir_all(&cache_dir).map_err(DiagramRenderError::CacheInit)?;

        let config = serde_json::to_vec_pretty(&diagram_config(theme))?;
        let config_digest = hash_bytes(&config);
        let config_path = cache_dir.join(format!("config-{}.json", &config_digest[..16]));
        fs::write(&config_path, &config).map_err(DiagramRenderError::CacheInit)?;

        Ok(Self {
            cli_path,
            cache_dir,
            config_path,
            config_digest,
        })
    }

    pub async fn render_svg(&self, source: &str) -> Result<String, DiagramRenderError> {
        let started_at = Instant::now();
        let cache_key = hash_bytes(format!("{}\n{source}", self.config_digest).as_bytes());
        let cache_path = self.cache_dir.join(format!("{cache_key}.svg"));
        match tokio::fs::read_to_string(&cache_path).await {
            Ok(svg) => {
                info!(
                    target = "application::diagram::mermaid",
                    op = "mermaid::render_svg",
                    result = "cache_hit",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    cache_path = %cache_path.display(),
                    svg_bytes = svg.len(),
                    "Mermaid diagram served from cache"
                );
                return Ok(svg);
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                warn!(
                    target = "application::diagram::mermaid",
                    op = "mermaid::render_svg",
                    result = "cache_read_error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    cache_path = %cache_path.display(),
                    error = %err,
                    "Failed to read cached Mermaid diagram; re-rendering"
                );
            }
        }

        let input_file = tempfile::Builder::new()
            .suffix(".mmd")
            .tempfile_in(&self.cache_dir)
            .map_err(DiagramRenderError::Io)?;
        tokio::fs::write(input_file.path(), source)
            .await
            .map_err(DiagramRenderError::Io)?;

        let output_file = tempfile::Builder::new()
            .suffix(".svg")
            .tempfile_in(&self.cache_dir)
            .map_err(DiagramRenderError::Io)?;
        let output_path = output_file.path().to_path_buf();

        let cli_started_at = Instant::now();
        let output = Command::new(&self.cli_path)
            .arg("--input")
            .arg(input_file.path())
            .arg("--output")
            .arg(&output_path)
            .arg("--outputFormat")
            .arg("svg")
            .arg("--configFile")
            .arg(&self.config_path)
            .arg("--quiet")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                warn!(
                    target = "application::diagram::mermaid",
                    op = "mermaid::render_svg",
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    cli_elapsed_ms = cli_started_at.elapsed().as_millis() as u64,
                    error_code = "spawn_cli",
                    error = %err,
                    "Failed to spawn Mermaid CLI"
                );
                if err.kind() == ErrorKind::NotFound {
                    DiagramRenderError::NotFound(err)
                } else {
                    DiagramRenderError::Io(err)
                }
            })?;

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            warn!(
                target = "application::diagram::mermaid",
                op = "mermaid::render_svg",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                cli_elapsed_ms = cli_started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                error_code = "mermaid_cli",
                stderr = %stderr,
                "Mermaid CLI invocation failed"
            );
            return Err(classify_cli_failure(exit_code, stderr));
        }

        match output_file.persist(&cache_path) {
            Ok(_) => {}
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {}
            Err(err) => return Err(DiagramRenderError::Io(err.error)),
        }

        let svg = tokio::fs::read_to_string(&cache_path).await.map_err(|err| {
            warn!(
                target = "application::diagram::mermaid",
                op = "mermaid::render_svg",
                result = "error",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                cli_elapsed_ms = cli_started_at.elapsed().as_millis() as u64,
                error_code = "cache_read",
                error = %err,
                "Failed to read rendered Mermaid SVG from cache"
            );
            DiagramRenderError::Read(err)
        })?;

        info!(
            target = "application::diagram::mermaid",
            op = "mermaid::render_svg",
            result = "cache_miss",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            cli_elapsed_ms = cli_started_at.elapsed().as_millis() as u64,
            cache_path = %cache_path.display(),
            svg_bytes = svg.len(),
            "Mermaid diagram rendered via CLI"
        );

        Ok(svg)
    }
}

#[async_trait]
impl DiagramRenderer for MermaidCliRenderer {
    async fn render(&self, _id: &str, source: &str) -> Result<RenderedDiagram, DiagramRenderError> {
        self.render_svg(source).await.map(RenderedDiagram::svg)
    }
}

/// Parse failures are reported by the CLI on stderr; surface the parser's own
/// message instead of the whole invocation dump.
fn classify_cli_failure(exit_code: Option<i32>, stderr: String) -> DiagramRenderError {
    let parse_message = stderr
        .lines()
        .map(str::trim)
        .find(|line| line.contains("Parse error") || line.contains("Syntax error"))
        .map(str::to_string);

    match parse_message {
        Some(message) => DiagramRenderError::syntax(message),
        None => DiagramRenderError::Cli { exit_code, stderr },
    }
}

/// Resolve `cli_path` to an existing file. Bare names are searched on `PATH`.
fn locate_executable(cli_path: &Path) -> Option<PathBuf> {
    if cli_path.components().count() > 1 || cli_path.is_absolute() {
        return cli_path.is_file().then(|| cli_path.to_path_buf());
    }

    let search_path = env::var_os("PATH")?;
    env::split_paths(&search_path)
        .map(|dir| dir.join(cli_path))
        .find(|candidate| candidate.is_file())
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
