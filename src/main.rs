use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand, ValueEnum};
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term::{self, termcolor::ColorChoice, termcolor::StandardStream};

use rumoca_frontend::s1_parser::{parse_stored_definition, ParseError};
use rumoca_frontend::s2_analyzer::parse::node::Visitable;
use rumoca_frontend::s2_analyzer::parse::repr_visitor::ReprVisitor;
use rumoca_frontend::s2_analyzer::symbols::ClassId;
use rumoca_frontend::s2_analyzer::view::ClassView;
use rumoca_frontend::s2_analyzer::{Context, FileSystemStorage, NamedElement, Reference, ScopeId};
use rumoca_frontend::s3_graphics::{self, GraphicsRenderer, JsonRenderer};
use rumoca_frontend::s4_generator;

#[derive(Parser, Debug)]
#[command(version, about = "Rumoca Modelica Frontend", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parses a file and prints its syntax tree
    Parse {
        /// The modelica *.mo file to parse
        #[arg(name = "MODELICA_FILE")]
        modelica_file: PathBuf,
    },

    /// Instantiates a class and prints what it resolved to
    Instantiate {
        #[arg(name = "MODELICA_FILE")]
        modelica_file: PathBuf,

        /// Dotted name of the class, e.g. `Circuit.Resistor`
        #[arg(name = "CLASS")]
        class: String,

        /// Library root directories, searched in order
        #[arg(short = 'L', long = "library")]
        libraries: Vec<PathBuf>,

        /// Renders a template with the instantiated class
        #[arg(short, long)]
        template: Option<String>,

        /// Prints the instantiated class as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Prints the icon or diagram graphics of a class as JSON
    Icon {
        #[arg(name = "MODELICA_FILE")]
        modelica_file: PathBuf,

        #[arg(name = "CLASS")]
        class: String,

        #[arg(long, value_enum, default_value_t = Layer::Icon)]
        layer: Layer,

        #[arg(short = 'L', long = "library")]
        libraries: Vec<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Layer {
    Icon,
    Simple,
    Diagram,
}

fn report(path: &Path, text: &str, errors: &[ParseError]) -> anyhow::Result<()> {
    let file = SimpleFile::new(path.display().to_string(), text);
    let writer = StandardStream::stderr(ColorChoice::Auto);
    let config = term::Config::default();
    for err in errors {
        term::emit(&mut writer.lock(), &config, &file, &err.to_diagnostic(()))?;
    }
    Ok(())
}

/// Opens `path` in a fresh context, with its directory as the workspace.
fn load(path: &Path, libraries: &[PathBuf], class: &str) -> anyhow::Result<(Context, ClassId)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut cx = Context::new();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        cx.set_workspace(Box::new(FileSystemStorage::new(dir)));
    }
    for library in libraries {
        cx.add_library(Box::new(FileSystemStorage::new(library)));
    }
    let document = cx.open_document(&path.display().to_string(), &text);
    if let Some(errors) = cx.document(document).map(|d| &d.errors).filter(|e| !e.is_empty()) {
        report(path, &text, errors)?;
        bail!("{} has syntax errors", path.display());
    }
    let Some(found) = cx
        .resolve(ScopeId::Document(document), &Reference::parse(class), false)
        .and_then(NamedElement::class)
    else {
        bail!("class `{class}` not found");
    };
    Ok((cx, found))
}

fn main() -> anyhow::Result<()> {
    rumoca_frontend::init_logger();
    let args = Args::parse();

    match args.command {
        Command::Parse { modelica_file } => {
            let text = std::fs::read_to_string(&modelica_file)
                .with_context(|| format!("failed to read {}", modelica_file.display()))?;
            match parse_stored_definition(&text) {
                Ok(def) => {
                    let mut repr_visitor = ReprVisitor::default();
                    def.accept(&mut repr_visitor, None);
                    print!("{}", repr_visitor.repr);
                }
                Err(err) => {
                    report(&modelica_file, &text, &[err])?;
                    bail!("{} has syntax errors", modelica_file.display());
                }
            }
        }
        Command::Instantiate {
            modelica_file,
            class,
            libraries,
            template,
            json,
        } => {
            let (mut cx, found) = load(&modelica_file, &libraries, &class)?;
            let view = ClassView::new(&mut cx, found);
            if let Some(template) = template {
                println!("{}", s4_generator::generate(&view, &template)?);
            } else if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!("{view}");
            }
            for cycle in cx.cycles() {
                log::info!("{cycle}");
            }
        }
        Command::Icon {
            modelica_file,
            class,
            layer,
            libraries,
        } => {
            let (mut cx, found) = load(&modelica_file, &libraries, &class)?;
            let graphics = match layer {
                Layer::Icon => s3_graphics::icon(&mut cx, found),
                Layer::Simple => s3_graphics::simple_icon(&mut cx, found),
                Layer::Diagram => s3_graphics::diagram(&mut cx, found),
            };
            println!("{}", JsonRenderer { pretty: true }.render(&graphics)?);
        }
    }

    Ok(())
}
