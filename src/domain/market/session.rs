use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// FX trading sessions in the order they open through the trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingSession {
    Sydney,
    Tokyo,
    London,
    NewYork,
}

/// Market-timing block attached to the integrated verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketTiming {
    pub session: TradingSession,
    pub activity_level: ActivityLevel,
    pub week_timing: WeekTiming,
    pub recommendation: TimingRecommendation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekTiming {
    WeekOpen,
    Midweek,
    WeekClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingRecommendation {
    Aggressive,
    Cautious,
    StandAside,
}

/// Session summary block published with the multi-timeframe analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub active_sessions: Vec<TradingSession>,
    pub optimal_for: &'static str,
}

fn jst_hour(now: DateTime<Utc>) -> u32 {
    (now.hour() + 9) % 24
}

fn jst_weekday(now: DateTime<Utc>) -> Weekday {
    // JST is UTC+9 with no DST; hours 15:00Z..24:00Z fall on the next JST day.
    if now.hour() >= 15 {
        now.weekday().succ()
    } else {
        now.weekday()
    }
}

/// Maps the current instant onto the fixed Tokyo/London/NY session table.
pub fn market_timing(now: DateTime<Utc>) -> MarketTiming {
    let hour = jst_hour(now);

    let (session, activity_level) = match hour {
        0..=6 => (TradingSession::Sydney, ActivityLevel::Low),
        7..=14 => (TradingSession::Tokyo, ActivityLevel::Medium),
        15..=20 => (TradingSession::London, ActivityLevel::High),
        _ => (TradingSession::NewYork, ActivityLevel::High),
    };

    let weekday = jst_weekday(now);
    let week_timing = match weekday {
        Weekday::Mon | Weekday::Tue => WeekTiming::WeekOpen,
        Weekday::Wed | Weekday::Thu => WeekTiming::Midweek,
        _ => WeekTiming::WeekClose,
    };

    let recommendation = match (session, weekday) {
        (TradingSession::London | TradingSession::NewYork, Weekday::Tue | Weekday::Wed | Weekday::Thu) => {
            TimingRecommendation::Aggressive
        }
        (TradingSession::Tokyo, Weekday::Tue | Weekday::Wed) => TimingRecommendation::Cautious,
        _ => TimingRecommendation::StandAside,
    };

    MarketTiming {
        session,
        activity_level,
        week_timing,
        recommendation,
    }
}

/// Which sessions are concurrently active right now (JST clock).
pub fn session_summary(now: DateTime<Utc>) -> SessionSummary {
    let hour = jst_hour(now);
    let mut active_sessions = Vec::new();

    // JST session windows; London and New York wrap past midnight.
    if (9..15).contains(&hour) {
        active_sessions.push(TradingSession::Tokyo);
    }
    if hour >= 16 || hour < 1 {
        active_sessions.push(TradingSession::London);
    }
    if hour >= 22 || hour < 5 {
        active_sessions.push(TradingSession::NewYork);
    }

    let optimal_for = if active_sessions.len() >= 2 {
        "day_trading"
    } else {
        "scalping"
    };

    SessionSummary {
        active_sessions,
        optimal_for,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_table_by_jst_hour() {
        // 03:00 JST = 18:00 UTC previous day -> Sydney, low activity
        let t = Utc.with_ymd_and_hms(2024, 1, 9, 18, 0, 0).unwrap();
        let timing = market_timing(t);
        assert_eq!(timing.session, TradingSession::Sydney);
        assert_eq!(timing.activity_level, ActivityLevel::Low);

        // 10:00 JST = 01:00 UTC -> Tokyo
        let t = Utc.with_ymd_and_hms(2024, 1, 10, 1, 0, 0).unwrap();
        assert_eq!(market_timing(t).session, TradingSession::Tokyo);

        // 17:00 JST = 08:00 UTC -> London, high activity
        let t = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        let timing = market_timing(t);
        assert_eq!(timing.session, TradingSession::London);
        assert_eq!(timing.activity_level, ActivityLevel::High);

        // 23:00 JST = 14:00 UTC -> New York
        let t = Utc.with_ymd_and_hms(2024, 1, 10, 14, 0, 0).unwrap();
        assert_eq!(market_timing(t).session, TradingSession::NewYork);
    }

    #[test]
    fn test_midweek_london_is_aggressive() {
        // Wednesday 17:00 JST = Wednesday 08:00 UTC
        let t = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        let timing = market_timing(t);
        assert_eq!(timing.week_timing, WeekTiming::Midweek);
        assert_eq!(timing.recommendation, TimingRecommendation::Aggressive);
    }

    #[test]
    fn test_weekday_rolls_over_with_jst() {
        // Friday 20:00 UTC = Saturday 05:00 JST -> week close
        let t = Utc.with_ymd_and_hms(2024, 1, 12, 20, 0, 0).unwrap();
        assert_eq!(market_timing(t).week_timing, WeekTiming::WeekClose);
    }

    #[test]
    fn test_overlapping_sessions() {
        // 23:30 JST: London and New York both active
        let t = Utc.with_ymd_and_hms(2024, 1, 10, 14, 30, 0).unwrap();
        let summary = session_summary(t);
        assert!(summary.active_sessions.contains(&TradingSession::London));
        assert!(summary.active_sessions.contains(&TradingSession::NewYork));
        assert_eq!(summary.optimal_for, "day_trading");
    }
}
