//! Progress analytics over a user's interview history.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::interview::models::MistakeType;
use crate::models::history::HistoryEntry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptPoint {
    /// 1-based, oldest attempt first.
    pub attempt: usize,
    pub date: DateTime<Utc>,
    pub score: u8,
    pub mistakes: usize,
    pub total_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MistakeTally {
    #[serde(rename = "type")]
    pub kind: MistakeType,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Faster,
    Slower,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeTrend {
    /// Absolute change of total time from first to last attempt, in percent.
    pub percent: f64,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub attempts: usize,
    pub average_improvement: Option<f64>,
    pub most_common_mistake: Option<MistakeTally>,
    pub time_trend: Option<TimeTrend>,
    pub series: Vec<AttemptPoint>,
}

/// `history` is newest first, as returned by the store.
pub fn compute_progress(history: &[HistoryEntry]) -> ProgressReport {
    let chronological: Vec<&HistoryEntry> = history.iter().rev().collect();

    let series = chronological
        .iter()
        .enumerate()
        .map(|(i, e)| AttemptPoint {
            attempt: i + 1,
            date: e.date,
            score: e.score,
            mistakes: e.mistakes.len(),
            total_time: e.total_time,
        })
        .collect();

    ProgressReport {
        attempts: chronological.len(),
        average_improvement: average_improvement(&chronological),
        most_common_mistake: most_common_mistake(&chronological),
        time_trend: time_trend(&chronological),
        series,
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn average_improvement(entries: &[&HistoryEntry]) -> Option<f64> {
    if entries.len() < 2 {
        return None;
    }
    let deltas: Vec<f64> = entries
        .windows(2)
        .map(|w| f64::from(w[1].score) - f64::from(w[0].score))
        .collect();
    Some(round1(deltas.iter().sum::<f64>() / deltas.len() as f64))
}

/// Most frequent non-`unanswered` type; ties go to the type seen first.
fn most_common_mistake(entries: &[&HistoryEntry]) -> Option<MistakeTally> {
    let mut tallies: Vec<MistakeTally> = Vec::new();
    for mistake in entries.iter().flat_map(|e| e.mistakes.iter()) {
        if mistake.kind == MistakeType::Unanswered {
            continue;
        }
        match tallies.iter_mut().find(|t| t.kind == mistake.kind) {
            Some(tally) => tally.count += 1,
            None => tallies.push(MistakeTally {
                kind: mistake.kind,
                count: 1,
            }),
        }
    }

    let mut best: Option<MistakeTally> = None;
    for tally in tallies {
        if best.as_ref().map_or(true, |b| tally.count > b.count) {
            best = Some(tally);
        }
    }
    best
}

fn time_trend(entries: &[&HistoryEntry]) -> Option<TimeTrend> {
    let (first, last) = match entries {
        [first, .., last] => (first.total_time, last.total_time),
        _ => return None,
    };
    if first == 0 {
        return None;
    }
    let change = (first as f64 - last as f64) / first as f64 * 100.0;
    let direction = if change > 0.0 {
        TrendDirection::Faster
    } else if change < 0.0 {
        TrendDirection::Slower
    } else {
        TrendDirection::Unchanged
    };
    Some(TimeTrend {
        percent: round1(change.abs()),
        direction,
    })
}
