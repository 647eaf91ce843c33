//! Command-line arguments.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use modelship_core::{Framework, InputShape, S3Uri, TargetDevice};

#[derive(Debug, Parser)]
#[command(
    name = "modelship",
    version,
    about = "Package, compile, deploy and invoke models on a hosted ML platform"
)]
pub struct Cli {
    /// Platform config file.
    #[arg(long, global = true, default_value = "modelship.json")]
    pub config: PathBuf,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build a model.tar.gz from local files.
    Package(PackageArgs),
    /// Upload an archive to object storage.
    Upload(UploadArgs),
    /// Run a compilation job and wait for its artifact.
    Compile(CompileArgs),
    /// Register a model and bring up an endpoint for it.
    Deploy(DeployArgs),
    /// Send one request to an endpoint; the response goes to stdout.
    Invoke(InvokeArgs),
    /// Delete an endpoint, its config and its model.
    Teardown(TeardownArgs),
    /// Package, upload, optionally compile, deploy, invoke and tear down.
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct PackageArgs {
    #[arg(long)]
    pub framework: Framework,

    #[arg(long, default_value = "model.tar.gz")]
    pub output: PathBuf,

    /// Files, directories or URLs, optionally renamed inside the archive:
    /// `FILE[=NAME]`. A trailing `!` unpacks a tarball: `URL![=DIR]`.
    #[arg(required = true, value_parser = parse_member)]
    pub members: Vec<Member>,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    pub archive: PathBuf,

    /// Exact key, or a prefix ending in `/`.
    pub uri: S3Uri,
}

#[derive(Debug, Args)]
pub struct CompileArgs {
    /// Job name; defaults to a timestamped one.
    #[arg(long)]
    pub name: Option<String>,

    /// Packaged model in object storage.
    #[arg(long)]
    pub input: S3Uri,

    /// Input shapes as JSON, e.g. `{"input0":[1,3,224,224]}`.
    #[arg(long)]
    pub shape: InputShape,

    #[arg(long)]
    pub framework: Framework,

    /// Output prefix for the compiled artifact.
    #[arg(long)]
    pub output: S3Uri,

    #[arg(long)]
    pub target: TargetDevice,

    /// Remote runtime budget in seconds.
    #[arg(long, default_value_t = 900)]
    pub max_runtime: u64,

    /// Keep polling until the service reports a terminal status.
    #[arg(long)]
    pub no_local_timeout: bool,
}

impl CompileArgs {
    pub fn max_runtime(&self) -> Duration {
        Duration::from_secs(self.max_runtime)
    }
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Endpoint name; the model shares it.
    #[arg(long)]
    pub name: String,

    /// Serving container image.
    #[arg(long)]
    pub image: String,

    #[arg(long)]
    pub artifact: S3Uri,

    #[arg(long)]
    pub instance_type: String,

    #[arg(long)]
    pub accelerator: Option<String>,

    #[arg(long, default_value_t = 1)]
    pub count: u32,

    /// Container environment variable, `KEY=VALUE`. Repeatable.
    #[arg(long = "env", value_parser = parse_key_value)]
    pub environment: Vec<(String, String)>,
}

#[derive(Debug, Args)]
pub struct InvokeArgs {
    #[arg(long)]
    pub endpoint: String,

    #[arg(long, default_value = "application/json")]
    pub content_type: String,

    #[arg(long)]
    pub accept: Option<String>,

    /// Request body file.
    #[arg(long)]
    pub body: PathBuf,
}

#[derive(Debug, Args)]
pub struct TeardownArgs {
    #[arg(long)]
    pub endpoint: String,

    /// Defaults to `<endpoint>-config`.
    #[arg(long)]
    pub config_name: Option<String>,

    /// Defaults to the endpoint name.
    #[arg(long)]
    pub model: Option<String>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long)]
    pub framework: Framework,

    /// Serving container image.
    #[arg(long)]
    pub image: String,

    #[arg(long)]
    pub shape: InputShape,

    #[arg(long)]
    pub target: TargetDevice,

    /// Compile for the target before deploying.
    #[arg(long)]
    pub compile: bool,

    /// Hosting instance type; defaults to the target's instance family.
    #[arg(long)]
    pub instance_type: Option<String>,

    #[arg(long)]
    pub accelerator: Option<String>,

    #[arg(long, default_value_t = 900)]
    pub max_runtime: u64,

    /// Request body to send once the endpoint is up.
    #[arg(long)]
    pub sample: Option<PathBuf>,

    #[arg(long, default_value = "application/json")]
    pub content_type: String,

    /// Leave the endpoint running.
    #[arg(long)]
    pub keep: bool,

    #[arg(long = "env", value_parser = parse_key_value)]
    pub environment: Vec<(String, String)>,

    #[arg(required = true, value_parser = parse_member)]
    pub members: Vec<Member>,
}

/// Where an archive member comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Local(PathBuf),
    /// Downloaded before packaging.
    Remote(String),
}

/// A member source and its name inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub source: Source,
    /// Archive name, or the directory an unpacked source lands in (empty for the root).
    pub name: String,
    /// The source is a `.tar.gz` whose contents are repacked.
    pub unpack: bool,
}

/// `FILE[=NAME]` or `URL[=NAME]`. Without `=NAME` the last path segment is
/// used. A URL with a query string is always taken whole.
///
/// A source ending in `!` is a tarball to unpack: `URL!` puts its contents at
/// the archive root, `URL!=DIR` under `DIR`.
pub fn parse_member(s: &str) -> Result<Member, String> {
    let remote = s.starts_with("http://") || s.starts_with("https://");
    let (source, rename) = match s.rsplit_once('=') {
        Some((source, name)) if !(remote && (source.contains('?') || name.contains('/'))) => {
            (source, Some(name))
        }
        _ => (s, None),
    };
    let (source, unpack) = match source.strip_suffix('!') {
        Some(inner) => (inner, true),
        None => (source, false),
    };
    if source.is_empty() {
        return Err(format!("expected FILE[=NAME], got {:?}", s));
    }

    let name = match rename {
        Some(name) => name.to_string(),
        None if unpack => String::new(),
        None => {
            let path = source.split(|c: char| c == '?' || c == '#').next().unwrap_or(source);
            path.rsplit('/')
                .next()
                .filter(|n| !n.is_empty())
                .ok_or_else(|| format!("no file name in {:?}", s))?
                .to_string()
        }
    };
    if name.is_empty() && !unpack {
        return Err(format!("expected FILE[=NAME], got {:?}", s));
    }
    let escapes = Path::new(&name)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(format!("archive name {:?} must be a relative path", name));
    }

    let source = if remote {
        Source::Remote(source.to_string())
    } else {
        Source::Local(PathBuf::from(source))
    };
    Ok(Member { source, name, unpack })
}

pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {:?}", s)),
    }
}
