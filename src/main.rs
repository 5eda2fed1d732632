//! JSON Lines のランドマーク列をエンジンに流し、コマンドが変わるたびに送信行を stdout に出す
//!
//! 入力は引数のファイル、無ければ stdin。1行が1フレームで、`null` は人物未検出。
//! ファイル入力時は stdin から操作できる:
//!   p  再キャリブレーション
//!   l  前後傾き判定の ON/OFF
//!   m  手動モードの ON/OFF

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use pose_pilot::config::Config;
use pose_pilot::log;
use pose_pilot::logging::{Logger, SharedLogger};
use pose_pilot::pose::PoseFrame;
use pose_pilot::runtime::{EngineHandle, PoseFeed};

const CONFIG_PATH: &str = "pose_pilot.toml";

fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH)?;

    let logger: SharedLogger = Arc::new(match Logger::open(&config.log.dir, "pose_pilot") {
        Ok(l) => l,
        Err(e) => {
            eprintln!("[log] {e:#}, logging to stderr only");
            Logger::stderr_only()
        }
    });
    log!(logger, "pose_pilot {}", env!("GIT_VERSION"));

    let input_path = std::env::args().nth(1);
    let reader: Box<dyn BufRead + Send> = match &input_path {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("failed to open {path}"))?;
            log!(logger, "[replay] reading {}", path);
            Box::new(BufReader::new(file))
        }
        None => {
            log!(logger, "[replay] reading stdin");
            Box::new(BufReader::new(io::stdin()))
        }
    };

    let handle = EngineHandle::spawn(&config, Arc::clone(&logger))?;

    // SIGUSR1 → 再キャリブレーション
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, handle.controls().calibration_flag())
        .context("failed to register SIGUSR1")?;

    let done = Arc::new(AtomicBool::new(false));
    {
        let feed = handle.feed();
        let logger = Arc::clone(&logger);
        let done = Arc::clone(&done);
        let interval = Duration::try_from_secs_f64(1.0 / config.replay.fps as f64)
            .with_context(|| format!("invalid replay.fps {}", config.replay.fps))?;
        std::thread::Builder::new()
            .name("replay".to_string())
            .spawn(move || {
                replay(reader, &feed, interval, &logger);
                done.store(true, Ordering::Relaxed);
            })
            .context("failed to spawn replay thread")?;
    }

    if input_path.is_some() {
        let remote = handle.remote();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                match line.trim() {
                    "p" => remote.request_calibration(),
                    "l" => {
                        remote.toggle_lean();
                    }
                    "m" => {
                        remote.toggle_manual_mode();
                    }
                    _ => {}
                }
            }
        });
    }

    let poll = Duration::try_from_secs_f64(1.0 / config.engine.poll_hz as f64)
        .with_context(|| format!("invalid engine.poll_hz {}", config.engine.poll_hz))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut last = None;
    loop {
        let finished = done.load(Ordering::Relaxed);
        let command = handle.command();
        if last.map_or(true, |prev| !command.same_codes(&prev)) {
            out.write_all(command.to_wire().as_bytes())?;
            out.flush()?;
            last = Some(command);
        }
        if finished {
            break;
        }
        std::thread::sleep(poll);
    }

    // 最後のフレームをワーカーが処理するまで待ってから止める
    std::thread::sleep(poll * 2);
    let command = handle.command();
    if last.map_or(true, |prev| !command.same_codes(&prev)) {
        out.write_all(command.to_wire().as_bytes())?;
        out.flush()?;
    }

    let status = handle.status();
    log!(
        logger,
        "[replay] done state={} walking={} gesture={}",
        status.state.as_str(),
        status.walking,
        status.gesture.map_or("-", |g| g.as_str())
    );
    handle.stop();
    Ok(())
}

/// 1行ずつデコードして `interval` ごとに流す。壊れた行はログに出して飛ばす
fn replay(reader: Box<dyn BufRead + Send>, feed: &PoseFeed, interval: Duration, logger: &Logger) {
    let mut frames = 0usize;
    let mut skipped = 0usize;
    for (lineno, line) in reader.lines().enumerate() {
        let start = Instant::now();
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                log!(logger, "[replay] read error: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match PoseFrame::from_json_line(&line) {
            Ok(frame) => {
                feed.publish(frame);
                frames += 1;
            }
            Err(e) => {
                log!(logger, "[replay] line {}: {:#}", lineno + 1, e);
                skipped += 1;
                continue;
            }
        }
        let elapsed = start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        }
    }
    log!(logger, "[replay] {} frames, {} skipped", frames, skipped);
}
