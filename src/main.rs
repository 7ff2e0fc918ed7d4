use std::fs::File;
use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};

use pfind::cli::Cli;
use pfind::{CancelToken, FindError, Finder};

/// 配置错误的退出码
const EXIT_CONFIG: u8 = 2;
/// 被中断时的退出码
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    // 解析命令行参数
    let cli = Cli::parse();

    // 初始化日志
    env_logger::Builder::new()
        .filter_level(if cli.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("错误: {:#}", err);
            match err.downcast_ref::<FindError>() {
                Some(find_err) if find_err.is_config_error() => ExitCode::from(EXIT_CONFIG),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode> {
    info!("开始运行 pfind");

    // 创建查找选项
    let options = cli.build_options()?;
    let timeout = cli.timeout()?;
    debug!("查找选项: {:?}", options);

    // 创建查找器
    let finder = Finder::new(options)?;

    // 设置中断处理，收到信号后取消遍历
    let cancel = match timeout {
        Some(limit) => CancelToken::with_timeout(limit),
        None => CancelToken::new(),
    };
    let interrupt = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\n收到中断信号，正在停止...");
        interrupt.cancel();
    })
    .context("设置信号处理失败")?;

    // 输出文件在遍历开始前创建，打不开时不做任何遍历
    let sink: Box<dyn Write + Send> = match &cli.out {
        Some(path) => {
            let file = File::create(path).map_err(|source| FindError::FilesystemError {
                source,
                path: path.clone(),
            })?;
            debug!("结果写入文件: {}", path.display());
            Box::new(file)
        }
        None => Box::new(io::stdout()),
    };

    // 执行搜索
    let summary = match finder.run(sink, &cancel) {
        Ok(summary) => summary,
        // 下游关闭管道（例如 `| head`）不算失败
        Err(err) if err.is_broken_pipe() => {
            debug!("输出管道已关闭: {}", err);
            return Ok(ExitCode::SUCCESS);
        }
        Err(err) => return Err(err).context("搜索失败"),
    };

    if summary.cancelled {
        warn!("搜索被中断，已输出 {} 个结果", summary.matched);
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }

    info!("搜索完成，共 {} 个结果", summary.matched);

    // 没有匹配时以非零退出
    if summary.matched == 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
