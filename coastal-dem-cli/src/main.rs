use anyhow::{Context, Result};
use clap::Parser;
use coastal_dem::params::{normalize_window_size, DEFAULT_PARAMS_FILE};
use coastal_dem::reader::collect_dem_files;
use coastal_dem::{run, run_batch, Params, RunSummary};
use rayon::ThreadPoolBuilder;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// パラメータファイル
    #[arg(value_name = "PARAMS", default_value = DEFAULT_PARAMS_FILE)]
    params: PathBuf,

    /// 入力DEM（ファイルまたはディレクトリ）。パラメータファイルの指定を上書き
    #[arg(short, long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// 出力ディレクトリ（デフォルト: 入力ファイルと同じ場所）
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// 並列処理スレッド数（デフォルト: CPUコア数）
    #[arg(short, long)]
    threads: Option<usize>,

    /// 窓サイズ（奇数）
    #[arg(short, long)]
    window_size: Option<i64>,

    /// 出力プロダクト（例: all, landforms, rrs, shoreline,dunecrest）
    #[arg(short, long)]
    products: Option<String>,

    /// 出力形式（ascii, envi, both, geotiff）
    #[arg(short, long)]
    format: Option<String>,

    /// トランセクトの走査方向（W, E, N, S）
    #[arg(short, long)]
    direction: Option<String>,
}

/// コマンドライン引数でパラメータを上書き
fn apply_overrides(params: &mut Params, args: &Args) -> Result<()> {
    if let Some(input) = &args.input {
        params.input = input.clone();
    }
    if let Some(size) = args.window_size {
        params.window_size = normalize_window_size(size)?;
    }
    if let Some(products) = &args.products {
        params.products = products.parse()?;
    }
    if let Some(format) = &args.format {
        params.format = format.parse()?;
    }
    if let Some(direction) = &args.direction {
        params.direction = direction.parse()?;
    }
    Ok(())
}

fn main() -> Result<()> {
    // ログの初期化
    tracing_subscriber::fmt::init();

    // CLI引数の解析
    let args = Args::parse();

    // 処理開始時間を記録
    let start_time = std::time::Instant::now();

    // スレッドプールの設定
    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    let mut params = Params::from_file(&args.params)
        .with_context(|| format!("Failed to load parameters from {:?}", args.params))?;
    apply_overrides(&mut params, &args)?;

    let output = args.output.as_deref();
    if params.input.is_dir() {
        // ディレクトリの処理
        info!("Processing directory: {:?}", params.input);
        process_directory(&params.input, &params, output)?;
    } else {
        let summary = run(&params, output)
            .with_context(|| format!("Failed to process {:?}", params.input))?;
        report(&summary);
    }

    // 処理時間を表示
    let elapsed = start_time.elapsed();
    info!("Total processing time: {:?}", elapsed);

    Ok(())
}

fn report(summary: &RunSummary) {
    info!(
        "{:?}: {} transects, {} shorelines, {} raster layers",
        summary.input,
        summary.transects,
        summary.shorelines_found,
        summary.rasters.len()
    );
    if let Some(path) = &summary.ascii {
        info!("Written metrics: {:?}", path);
    }
}

fn process_directory(dir: &Path, params: &Params, output: Option<&Path>) -> Result<()> {
    // DEMファイルを再帰的に収集
    let input_files = collect_dem_files(dir)?;
    info!("Found {} input files (ENVI/GeoTIFF)", input_files.len());

    // 並列処理でファイルを変換
    let results = run_batch(&input_files, params, output);

    // エラーをチェック
    let mut errors = Vec::new();
    for (path, result) in results {
        match result {
            Ok(summary) => report(&summary),
            Err(e) => errors.push(format!("{}: {}", path.display(), e)),
        }
    }

    if !errors.is_empty() {
        error!("Failed to process {} files:", errors.len());
        for err in &errors {
            error!("  {}", err);
        }
        anyhow::bail!("{} files failed to process", errors.len());
    }

    Ok(())
}
