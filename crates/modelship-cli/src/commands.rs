//! Subcommand implementations.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use modelship_client::PlatformClient;
use modelship_compile::{CompilationJob, CompilationReport, Compiler, InputConfig, OutputConfig};
use modelship_core::{unique_name, Framework, PlatformConfig, S3Uri};
use modelship_hosting::{Deployer, Deployment, EndpointSpec, ModelSpec};
use modelship_package::{check_layout, fetch, unpack, upload_model, ModelArchive, PackagedModel};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::args::*;

/// Everything a subcommand needs, built once from the loaded config.
pub struct Session {
    pub config: PlatformConfig,
    pub client: Arc<PlatformClient>,
}

impl Session {
    pub fn new(config: PlatformConfig) -> Result<Self> {
        let client = PlatformClient::new(&config).context("creating platform client")?;
        Ok(Self {
            config,
            client: Arc::new(client),
        })
    }

    fn compiler(&self) -> Compiler {
        Compiler::new(self.client.clone(), &self.config)
    }

    fn deployer(&self) -> Deployer {
        Deployer::new(self.client.clone(), self.client.clone(), &self.config)
    }
}

pub async fn package(session: &Session, args: PackageArgs) -> Result<()> {
    let packaged = build_archive(session, args.framework, &args.members, &args.output).await?;
    print_json(&packaged)
}

pub async fn upload(session: &Session, args: UploadArgs) -> Result<()> {
    let packaged = PackagedModel::open(&args.archive)
        .await
        .with_context(|| format!("reading {}", args.archive.display()))?;
    let uri = upload_model(session.client.as_ref(), &packaged, &args.uri)
        .await
        .with_context(|| format!("uploading {} to {}", args.archive.display(), args.uri))?;
    println!("{}", uri);
    Ok(())
}

pub async fn compile(session: &Session, args: CompileArgs) -> Result<()> {
    session.config.validate().context("invalid platform config")?;

    let name = args.name.clone().unwrap_or_else(|| unique_name("modelship-compile"));
    let job = CompilationJob::new(
        name,
        session.config.role_arn()?,
        InputConfig {
            location: args.input.clone(),
            shape: args.shape.clone(),
            framework: args.framework,
        },
        OutputConfig {
            location: args.output.clone(),
            target: args.target,
        },
    )
    .with_max_runtime(args.max_runtime());

    let mut compiler = session.compiler();
    if args.no_local_timeout {
        compiler = compiler.without_local_timeout();
    }
    let report = compiler
        .compile(&job)
        .await
        .with_context(|| format!("compiling {} for {}", args.input, args.target))?;
    print_json(&report)
}

pub async fn deploy(session: &Session, args: DeployArgs) -> Result<()> {
    session.config.validate().context("invalid platform config")?;

    let model = ModelSpec {
        name: args.name.clone(),
        image: args.image,
        artifact: args.artifact,
        role_arn: session.config.role_arn()?.to_string(),
        environment: args.environment.into_iter().collect(),
    };
    let mut endpoint = EndpointSpec::new(&args.name, args.instance_type).with_instance_count(args.count);
    if let Some(accelerator) = args.accelerator {
        endpoint = endpoint.with_accelerator(accelerator);
    }

    let deployment = session
        .deployer()
        .deploy(&model, &endpoint)
        .await
        .with_context(|| format!("deploying endpoint {}", args.name))?;
    print_json(&deployment)
}

pub async fn invoke(session: &Session, args: InvokeArgs) -> Result<()> {
    let body = tokio::fs::read(&args.body)
        .await
        .with_context(|| format!("reading {}", args.body.display()))?;
    let response = session
        .deployer()
        .invoke(&args.endpoint, &args.content_type, args.accept.as_deref(), body)
        .await
        .with_context(|| format!("invoking {}", args.endpoint))?;
    write_stdout(&response.body).await
}

pub async fn teardown(session: &Session, args: TeardownArgs) -> Result<()> {
    let deployment = Deployment {
        endpoint_config: args
            .config_name
            .unwrap_or_else(|| format!("{}-config", args.endpoint)),
        model: args.model.unwrap_or_else(|| args.endpoint.clone()),
        endpoint: args.endpoint,
    };
    session
        .deployer()
        .teardown(&deployment)
        .await
        .with_context(|| format!("tearing down {}", deployment.endpoint))
}

/// The full runbook. The endpoint is torn down whether or not the sample
/// invocation succeeds, unless `--keep` is given.
pub async fn run(session: &Session, args: RunArgs) -> Result<()> {
    session.config.validate().context("invalid platform config")?;

    let base = unique_name(&format!("modelship-{}", args.framework.as_str().to_lowercase()));
    let prefix = S3Uri::new(session.config.bucket()?, base.as_str());
    let instance_type = match &args.instance_type {
        Some(t) => t.clone(),
        None => args
            .target
            .instance_type()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("{} is not a hosting target; pass --instance-type", args.target))?,
    };

    info!("Run {}: packaging {} members", base, args.members.len());
    let workdir = tempfile::Builder::new()
        .prefix("modelship-")
        .tempdir()
        .context("creating work directory")?;
    let packaged = build_archive(
        session,
        args.framework,
        &args.members,
        &workdir.path().join("model.tar.gz"),
    )
    .await?;

    let uploaded = upload_model(session.client.as_ref(), &packaged, &prefix.join("model/"))
        .await
        .context("uploading model archive")?;

    let artifact = if args.compile {
        let report = compile_for_run(session, &args, &base, uploaded, &prefix).await?;
        report.artifact
    } else {
        uploaded
    };

    let model = ModelSpec {
        name: base.clone(),
        image: args.image.clone(),
        artifact,
        role_arn: session.config.role_arn()?.to_string(),
        environment: args.environment.iter().cloned().collect::<BTreeMap<_, _>>(),
    };
    let mut endpoint = EndpointSpec::new(&base, instance_type);
    if let Some(accelerator) = &args.accelerator {
        endpoint = endpoint.with_accelerator(accelerator.clone());
    }
    let deployment = Deployment {
        model: model.name.clone(),
        endpoint_config: endpoint.config_name.clone(),
        endpoint: endpoint.name.clone(),
    };

    let deployer = session.deployer();
    let outcome = match deployer.deploy(&model, &endpoint).await {
        Ok(_) => invoke_sample(&deployer, &args, &base).await,
        Err(e) => Err(anyhow::Error::new(e).context(format!("deploying endpoint {}", base))),
    };

    if args.keep && outcome.is_ok() {
        info!("Leaving endpoint {} running", base);
        print_json(&deployment)?;
    } else if let Err(e) = deployer.teardown(&deployment).await {
        warn!("Teardown of {} incomplete: {}", base, e);
        if outcome.is_ok() {
            return Err(anyhow::Error::new(e).context(format!("tearing down {}", base)));
        }
    }

    outcome
}

async fn compile_for_run(
    session: &Session,
    args: &RunArgs,
    base: &str,
    input: S3Uri,
    prefix: &S3Uri,
) -> Result<CompilationReport> {
    let job = CompilationJob::new(
        base,
        session.config.role_arn()?,
        InputConfig {
            location: input,
            shape: args.shape.clone(),
            framework: args.framework,
        },
        OutputConfig {
            location: prefix.join("compiled"),
            target: args.target,
        },
    )
    .with_max_runtime(Duration::from_secs(args.max_runtime));

    session.compiler()
        .compile(&job)
        .await
        .with_context(|| format!("compiling for {}", args.target))
}

async fn invoke_sample(deployer: &Deployer, args: &RunArgs, endpoint: &str) -> Result<()> {
    let Some(sample) = &args.sample else {
        return Ok(());
    };
    let body = tokio::fs::read(sample)
        .await
        .with_context(|| format!("reading {}", sample.display()))?;
    let response = deployer
        .invoke(endpoint, &args.content_type, None, body)
        .await
        .with_context(|| format!("invoking {}", endpoint))?;
    write_stdout(&response.body).await
}

async fn build_archive(
    session: &Session,
    framework: Framework,
    members: &[Member],
    output: &Path,
) -> Result<PackagedModel> {
    // Downloads must outlive the archive write.
    let downloads = tempfile::Builder::new()
        .prefix("modelship-fetch-")
        .tempdir()
        .context("creating download directory")?;

    let mut archive = ModelArchive::builder();
    for (index, member) in members.iter().enumerate() {
        let source = match &member.source {
            Source::Local(path) => path.clone(),
            Source::Remote(url) => {
                let dest = downloads.path().join(format!("download-{}", index));
                fetch(session.client.http(), url, &dest)
                    .await
                    .with_context(|| format!("fetching {}", url))?;
                dest
            }
        };

        if !member.unpack {
            archive = archive.add(source, &member.name);
            continue;
        }
        let dir = downloads.path().join(format!("unpacked-{}", index));
        let names = unpack(&source, &dir)
            .await
            .with_context(|| format!("unpacking {}", source.display()))?;
        for name in names {
            let inner = if member.name.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", member.name.trim_end_matches('/'), name)
            };
            archive = archive.add(dir.join(&name), inner);
        }
    }

    let packaged = archive
        .write(output)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    check_layout(framework, &packaged.entries)
        .with_context(|| format!("{} is not a valid {} model archive", output.display(), framework))?;
    Ok(packaged)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn write_stdout(body: &[u8]) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(body).await?;
    if !body.ends_with(b"\n") {
        stdout.write_all(b"\n").await?;
    }
    stdout.flush().await?;
    Ok(())
}
