//! Message body in, reply text out, through the real pipeline with a
//! scripted calculator underneath.

use anyhow::anyhow;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use equity_bot::calculator::RawRun;
use equity_bot::engine::evaluator::EvaluatorConfig;
use equity_bot::engine::renderer::REPLY_SEPARATOR;
use equity_bot::engine::EquityEngine;
use equity_bot::types::OptionKind;

use crate::scripted_calculator::{ScriptedCalculator, SlowCalculator};

const AA_KK: &str = "0\n***\nAA: 81.95%\nKK: 18.05%\n\n";

fn engine(calc: ScriptedCalculator) -> EquityEngine {
    EquityEngine::new(Arc::new(calc), EvaluatorConfig::default())
}

#[tokio::test]
async fn test_bare_ranges_after_mention() {
    let calc = ScriptedCalculator::exact(AA_KK);
    let seen = calc.invocations();

    let reply = engine(calc).handle("u/THE-equity-bot AA KK").await;

    assert_eq!(reply, "Range|Equity\n:--|--:\naa|0.8195\nkk|0.1805\n");
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].ranges, vec!["aa", "kk"]);
    assert!(seen[0].options.is_empty());
    assert!(!seen[0].monte_carlo);
    assert_eq!(seen[0].time_budget_secs, 3.0);
}

#[tokio::test]
async fn test_seven_ranges_never_reach_calculator() {
    let calc = ScriptedCalculator::exact(AA_KK);
    let seen = calc.invocations();

    let reply = engine(calc).handle("{AA KK QQ JJ TT 99 88}").await;

    assert_eq!(reply, "Error: can only process up to 6 ranges");
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_board_option_passed_through() {
    let calc = ScriptedCalculator::exact(AA_KK);
    let seen = calc.invocations();

    engine(calc).handle("{AA KK b:AsKsQs}").await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].ranges, vec!["aa", "kk"]);
    assert_eq!(
        seen[0].options.get(&OptionKind::Board).map(String::as_str),
        Some("AsKsQs")
    );
    let args = seen[0].args();
    assert!(args.windows(2).any(|w| w[0] == "-b" && w[1] == "AsKsQs"));
    assert_eq!(&args[args.len() - 2..], ["aa", "kk"]);
}

#[tokio::test]
async fn test_budget_exceeded_escalates_once() {
    let calc = ScriptedCalculator::new(|inv| {
        if inv.monte_carlo {
            Ok(RawRun::success("2\n***\nAKo: 45.12%\nQQ: 54.88%\n"))
        } else {
            Ok(RawRun::success("1\n"))
        }
    });
    let seen = calc.invocations();

    let reply = engine(calc).handle("{AKo QQ d:2c2d}").await;

    assert!(reply.starts_with("Range|Equity\n:--|--:\nako|0.4512\nqq|0.5488\n"));
    assert!(reply.contains("Monte Carlo"));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(!seen[0].monte_carlo);
    assert!(seen[1].monte_carlo);
    assert_eq!(seen[1].time_budget_secs, 5.0);
    assert_eq!(seen[0].options, seen[1].options);
}

#[tokio::test]
async fn test_failure_classification() {
    let calc = ScriptedCalculator::new(|inv| match inv.ranges[0].as_str() {
        "asks" => Ok(RawRun::failed(8, "conflict")),
        "zz" => Ok(RawRun::failed(1, "error: bad range: zz")),
        _ => Err(anyhow!("spawn failed")),
    });

    let reply = engine(calc)
        .handle("{AsKs AsQs} {ZZ KK} {AA KK}")
        .await;
    let parts: Vec<&str> = reply.split(REPLY_SEPARATOR).collect();

    assert_eq!(
        parts,
        vec![
            "Error: range conflict: 2 ranges (or board/dead cards) contain the same card",
            "Error: invalid range (zz)",
            "Error: the equity calculator could not process this request",
        ]
    );
}

#[tokio::test]
async fn test_one_bad_query_does_not_spoil_the_rest() {
    let reply = engine(ScriptedCalculator::exact(AA_KK))
        .handle("{AA KK} {AA q:1 KK} {AA}")
        .await;
    let parts: Vec<&str> = reply.split(REPLY_SEPARATOR).collect();

    assert_eq!(parts.len(), 3);
    assert!(parts[0].starts_with("Range|Equity"));
    assert!(parts[1].starts_with("Error: cannot parse option"));
    assert_eq!(parts[2], "Error: need at least 2 ranges to run analysis");
}

#[tokio::test]
async fn test_broken_calculator_replies_instead_of_failing() {
    let reply = engine(ScriptedCalculator::broken()).handle("AA KK").await;
    assert_eq!(reply, "Error: the equity calculator could not process this request");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_long_message_runs_calculator_within_limit() {
    let calc = SlowCalculator::new(Duration::from_millis(20));
    let peak = calc.peak();
    let config = EvaluatorConfig {
        max_concurrent_queries: 3,
        ..EvaluatorConfig::default()
    };
    let engine = EquityEngine::new(Arc::new(calc), config);

    let reply = engine.handle(&"{AA KK}".repeat(40)).await;

    let parts: Vec<&str> = reply.split(REPLY_SEPARATOR).collect();
    assert_eq!(parts.len(), 40);
    assert!(parts.iter().all(|p| p.starts_with("Range|Equity")));
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrent runs was {peak}");
    assert!(peak >= 1);
}
