use common_types::{
    DeployerInfo, LiquidityInfo, Subscription, TokenCandidate, VerificationInfo,
};

use crate::markdown::escape_md_v2;

fn fmt_native(v: f64) -> String {
    escape_md_v2(&format!("{v:.4}"))
}

fn fmt_price(v: f64) -> String {
    escape_md_v2(&format!("{v:.9}"))
}

fn header(candidate: &TokenCandidate) -> String {
    let title = if candidate.name.is_empty() {
        candidate.symbol.clone()
    } else {
        format!("{} ({})", candidate.symbol, candidate.name)
    };
    format!(
        "🚨 *New Token Detected\\!*\n\n*{}* on {}\n📬 `{:#x}`",
        escape_md_v2(&title),
        escape_md_v2(&candidate.chain.to_string()),
        candidate.address
    )
}

fn links(candidate: &TokenCandidate) -> String {
    format!(
        "🔗 [Explorer]({}) \\| [Dexscreener]({})",
        candidate.chain.explorer_address_url(candidate.address),
        candidate.chain.dexscreener_url(candidate.address)
    )
}

/// Ticker-match alert: sent before any liquidity or market data exists.
pub fn format_immediate_alert(candidate: &TokenCandidate, deployer: &DeployerInfo) -> String {
    format!(
        "{}\n👤 Deployer `{:#x}` \\({} {}\\)\n{}",
        header(candidate),
        deployer.address,
        fmt_native(deployer.native_balance),
        escape_md_v2(candidate.chain.native_ticker()),
        links(candidate)
    )
}

/// Threshold-match alert: carries the balances that satisfied the filter.
pub fn format_threshold_alert(
    candidate: &TokenCandidate,
    deployer: &DeployerInfo,
    token_balance: f64,
    liq: &LiquidityInfo,
) -> String {
    let native = candidate.chain.native_ticker();
    let lp_line = match liq.pair {
        Some(pair) => format!(
            "💧 LP `{:#x}` reserve {} {}",
            pair,
            fmt_native(liq.native_reserve),
            escape_md_v2(native)
        ),
        None => "💧 No LP".to_string(),
    };
    format!(
        "{}\n👤 Deployer `{:#x}`\n💰 Contract balance {} {}\n{}\n{}",
        header(candidate),
        deployer.address,
        fmt_native(token_balance),
        escape_md_v2(native),
        lp_line,
        links(candidate)
    )
}

/// Follow-up with liquidity, market data, verification and the risk
/// markers found in verified source.
pub fn format_enrichment(
    candidate: &TokenCandidate,
    liq: &LiquidityInfo,
    verification: &VerificationInfo,
    pattern_hits: &[String],
) -> String {
    let native = candidate.chain.native_ticker();
    let symbol = escape_md_v2(&candidate.symbol);
    let liq_block = match liq.pair {
        Some(pair) => {
            let price = liq
                .price_native
                .map(fmt_price)
                .unwrap_or_else(|| "n/a".into());
            let mcap = liq
                .market_cap_native
                .map(fmt_native)
                .unwrap_or_else(|| "n/a".into());
            format!(
                "💧 LP `{:#x}`\nreserve {} {} \\| price {} {} \\| mcap {} {}",
                pair,
                fmt_native(liq.native_reserve),
                escape_md_v2(native),
                price,
                escape_md_v2(native),
                mcap,
                escape_md_v2(native)
            )
        }
        None => "💧 No LP yet".to_string(),
    };
    let verify_line = if verification.verified {
        match &verification.contract_name {
            Some(name) => format!("✅ Verified source: {}", escape_md_v2(name)),
            None => "✅ Verified source".to_string(),
        }
    } else {
        "⚠️ Source not verified".to_string()
    };
    let risk_line = if pattern_hits.is_empty() {
        String::new()
    } else {
        format!("\n🕵️ Markers: {}", escape_md_v2(&pattern_hits.join(", ")))
    };
    format!(
        "📊 *{}* update\n`{:#x}`\n{}\n{}{}",
        symbol, candidate.address, liq_block, verify_line, risk_line
    )
}

pub fn format_filter_added(sub: &Subscription, active: usize) -> String {
    format!(
        "✅ Filter added: {}\n{} active filter\\(s\\)",
        escape_md_v2(&describe(sub)),
        active
    )
}

pub fn format_filter_removed(sub: &Subscription, found: bool) -> String {
    if found {
        format!("🛑 Filter removed: {}", escape_md_v2(&describe(sub)))
    } else {
        format!("⚠️ No such filter: {}", escape_md_v2(&describe(sub)))
    }
}

pub fn format_filter_list(subs: &[Subscription]) -> String {
    if subs.is_empty() {
        return "🚫 No active filters\\.".to_string();
    }
    let lines: Vec<String> = subs
        .iter()
        .map(|s| format!("• {}", escape_md_v2(&describe(s))))
        .collect();
    format!("🎯 Active filters:\n{}", lines.join("\n"))
}

fn describe(sub: &Subscription) -> String {
    match &sub.ticker {
        Some(t) => format!("ticker {} on {}", t, sub.chain),
        None => format!("threshold {} {} on {}", sub.eth, sub.chain.native_ticker(), sub.chain),
    }
}
