use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use amp_dom::Document;
use amp_optimizer::amp::is_runtime_style;
use amp_optimizer::{
    Configuration, Error, ErrorCollection, ErrorKind, Pipeline, RemoteGetRequest, ValidatorSpec,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "amp-optimize")]
#[command(about = "AMP optimizer: server-side rendering and head cleanup for AMP pages")]
#[command(version)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Validator spec file (JSON); the bundled spec when omitted
    #[arg(long, global = true)]
    spec: Option<PathBuf>,

    /// Log every pass
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Optimize a document and print the result
    Optimize {
        /// Input document (.html or .json node tree)
        path: PathBuf,

        /// Emit the JSON node tree instead of HTML
        #[arg(long)]
        json: bool,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Optimize a document and report errors without printing it
    Check {
        /// Input document (.html or .json node tree)
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref());
    let spec = load_spec(cli.spec.as_deref());

    match cli.command {
        Command::Optimize { path, json, output } => {
            cmd_optimize(&path, json, output.as_deref(), &config, spec)
        }
        Command::Check { path } => cmd_check(&path, &config, spec),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "amp_optimizer=debug" } else { "amp_optimizer=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

fn read_file(path: &Path) -> String {
    if !path.exists() {
        fail(format_args!("file not found: {}", path.display()));
    }
    match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => fail(format_args!("reading {}: {e}", path.display())),
    }
}

fn load_config(path: Option<&Path>) -> Configuration {
    let Some(path) = path else {
        return Configuration::default();
    };
    Configuration::from_json(&read_file(path)).unwrap_or_else(|e| fail(e))
}

fn load_spec(path: Option<&Path>) -> Arc<ValidatorSpec> {
    let spec = match path {
        Some(path) => ValidatorSpec::from_json(&read_file(path)),
        None => ValidatorSpec::bundled(),
    };
    Arc::new(spec.unwrap_or_else(|e| fail(e)))
}

fn load_document(path: &Path) -> Document {
    let source = read_file(path);
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let parsed = if is_json {
        Document::from_json(&source)
    } else {
        amp_dom::fixture::parse_document(&source)
    };
    parsed.unwrap_or_else(|e| fail(format_args!("{}: {e}", path.display())))
}

fn wants_runtime_css(doc: &Document, pipeline: &Pipeline) -> bool {
    pipeline.names().contains(&"AmpRuntimeCss")
        && doc
            .element_children(doc.head())
            .into_iter()
            .any(|c| doc.element(c).is_some_and(is_runtime_style))
}

#[cfg(feature = "http")]
fn transport() -> Arc<dyn RemoteGetRequest> {
    Arc::new(amp_optimizer::transport::UreqRemoteGetRequest::default())
}

#[cfg(not(feature = "http"))]
fn transport() -> Arc<dyn RemoteGetRequest> {
    Arc::new(amp_optimizer::StubbedRemoteGetRequest::new())
}

/// Run the pipeline, exiting on a hard error.
fn run(doc: &mut Document, config: &Configuration, spec: Arc<ValidatorSpec>) -> ErrorCollection {
    let pipeline =
        Pipeline::from_configuration(config, spec, transport()).unwrap_or_else(|e| fail(e));

    let mut errors = ErrorCollection::new();

    // Without a transport the stylesheet falls back to a link; say why.
    if cfg!(not(feature = "http")) && wants_runtime_css(doc, &pipeline) {
        errors.add(Error::missing_package("ureq", "http"));
    }

    if let Err(e) = pipeline.run(doc, &mut errors) {
        fail(e);
    }
    errors
}

fn report(errors: &ErrorCollection) {
    for error in errors {
        match &error.tag {
            Some(tag) => eprintln!("warning: <{tag}> {error}"),
            None => eprintln!("warning: {error}"),
        }
    }
}

fn cmd_optimize(
    path: &Path,
    json: bool,
    output: Option<&Path>,
    config: &Configuration,
    spec: Arc<ValidatorSpec>,
) {
    let mut doc = load_document(path);
    let errors = run(&mut doc, config, spec);
    report(&errors);

    let rendered = if json {
        doc.to_json().unwrap_or_else(|e| fail(e))
    } else {
        doc.to_html()
    };

    match output {
        Some(out) => {
            if let Err(e) = std::fs::write(out, &rendered) {
                fail(format_args!("writing {}: {e}", out.display()));
            }
            eprintln!("Optimized: {}", out.display());
        }
        None => println!("{rendered}"),
    }
}

/// Errors that fail `check`; the rest are only warnings.
fn is_blocking(error: &Error) -> bool {
    !matches!(
        error.kind,
        ErrorKind::CannotInlineRuntimeCss | ErrorKind::MissingPackage | ErrorKind::DeprecatedTransformer
    )
}

fn cmd_check(path: &Path, config: &Configuration, spec: Arc<ValidatorSpec>) {
    let mut doc = load_document(path);
    let errors = run(&mut doc, config, spec);
    report(&errors);
    let blocking = errors.iter().filter(|e| is_blocking(e)).count();
    if blocking == 0 {
        eprintln!("OK: {}", path.display());
        return;
    }
    eprintln!("{blocking} error(s) in {}", path.display());
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_css_and_missing_package_do_not_block() {
        assert!(!is_blocking(&Error::missing_runtime_style()));
        assert!(!is_blocking(&Error::runtime_css_unavailable("https://cdn.ampproject.org/v0.css", "offline")));
        assert!(!is_blocking(&Error::missing_package("ureq", "http")));
    }

    #[test]
    fn test_rendering_errors_block() {
        assert!(is_blocking(&Error::invalid_width("amp-img", "abc")));
    }
}
