use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use switchfs::core::secondary_path_for;
use switchfs::settings::PRELOAD_SETTING;
use switchfs::{Directory, DirectoryFactory, PreloadExtensions, Settings};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "switchfs", version, about = "Inspect preload/switch store layout of a shard")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct StoreArgs {
    /// 分片数据目录：.../<node>/indices/<uuid>/<shard>/index
    location: PathBuf,
    /// settings.toml
    #[arg(long)]
    config: Option<PathBuf>,
    /// 覆盖 index.store.preload，逗号分隔（如 dvd,tim 或 *）
    #[arg(long, value_delimiter = ',')]
    preload: Option<Vec<String>>,
}

impl StoreArgs {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        if let Some(exts) = &self.preload {
            let over = Settings::builder()
                .put_list(PRELOAD_SETTING, exts.iter().cloned())
                .build();
            settings = settings.merged(over);
        }
        Ok(settings)
    }
}

#[derive(Subcommand)]
enum Command {
    /// 打印副后端（缓冲 I/O）目录，不创建
    Resolve { location: PathBuf },
    /// 按扩展名集合对文件名分类
    Classify {
        #[arg(long, value_delimiter = ',')]
        preload: Vec<String>,
        names: Vec<String>,
    },
    /// 列出文件及其所属后端
    Ls(StoreArgs),
    /// 后端资源统计
    Stat(StoreArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Resolve { location } => {
            println!("{}", secondary_path_for(&location)?.display());
        }
        Command::Classify { preload, names } => {
            let exts = PreloadExtensions::new(preload);
            for name in names {
                println!("{}\t{}", exts.classify(&name), name);
            }
        }
        Command::Ls(args) => {
            let settings = args.settings()?;
            let dir = DirectoryFactory::from_settings(&args.location, &settings)?;
            info!("listing {:?} (switching={})", dir.root(), dir.is_switching());
            let exts = settings.preload_extensions();
            for name in dir.list_all()? {
                let route = match dir.as_switching() {
                    Some(s) => s.route(&name).to_string(),
                    None => "mapped".to_string(),
                };
                match dir.file_length(&name) {
                    Ok(len) => println!("{}\t{}\t{}", route, len, name),
                    // 在“错误”后端里的文件，或列举之后被删：分类后端找不到它
                    Err(e) if e.is_not_found() => println!("{}\t-\t{}", route, name),
                    Err(e) => {
                        warn!("cannot stat {}: {}", name, e);
                        println!("{}\t?\t{}", route, name);
                    }
                }
            }
            if !exts.is_empty() {
                info!("preload: {}", exts);
            }
            dir.close()?;
        }
        Command::Stat(args) => {
            let settings = args.settings()?;
            let dir = DirectoryFactory::from_settings(&args.location, &settings)?;
            print!("{}", dir.stats()?);
            dir.close()?;
        }
    }
    Ok(())
}
