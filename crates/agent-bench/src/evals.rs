//! Deferred evaluation of an agent's model calls
//!
//! `EvalEvent`s are collected while a run is drained; checks only execute when
//! the summary is requested.

use std::time::Duration;

use agent_core::tool::string_arg;
use agent_core::EvalEvent;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Runs on every model call
    Universal,
    /// Runs on the arguments of each matching tool call
    ToolArguments,
    /// Counts tool usage over the whole run
    ToolCount,
    /// Runs on the final response
    FinalContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalResult {
    pub check_name: String,
    pub kind: CheckKind,
    pub passed: bool,
    /// 0.0 to 1.0
    pub score: f64,
    pub message: String,
}

impl EvalResult {
    fn new(check_name: &str, kind: CheckKind, passed: bool, score: f64, message: impl Into<String>) -> Self {
        Self {
            check_name: check_name.to_string(),
            kind,
            passed,
            score,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    NoErrors,
    LatencyUnder(Duration),
    /// Passes when any keyword is present; scored by the fraction found
    HasKeywords(Vec<String>),
    /// Minimum number of characters
    HasContent(usize),
}

impl Check {
    pub fn keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::HasKeywords(keywords.into_iter().map(Into::into).collect())
    }

    fn on_event(&self, name: &str, kind: CheckKind, event: &EvalEvent) -> EvalResult {
        match self {
            Check::NoErrors => match &event.error {
                None => EvalResult::new(name, kind, true, 1.0, "no errors"),
                Some(e) => EvalResult::new(name, kind, false, 0.0, format!("call failed: {}", e)),
            },
            Check::LatencyUnder(limit) => {
                let passed = event.duration < *limit;
                let message = format!(
                    "took {}, limit {}",
                    format_duration(event.duration),
                    format_duration(*limit)
                );
                EvalResult::new(name, kind, passed, if passed { 1.0 } else { 0.0 }, message)
            }
            Check::HasKeywords(_) | Check::HasContent(_) => self.on_text(name, kind, &event.content),
        }
    }

    fn on_text(&self, name: &str, kind: CheckKind, text: &str) -> EvalResult {
        match self {
            Check::HasKeywords(keywords) => keyword_result(name, kind, keywords, text),
            Check::HasContent(min) => {
                let len = text.trim().chars().count();
                let passed = len >= *min;
                let score = if *min == 0 { 1.0 } else { (len as f64 / *min as f64).min(1.0) };
                EvalResult::new(name, kind, passed, score, format!("{} characters, minimum {}", len, min))
            }
            Check::NoErrors | Check::LatencyUnder(_) => EvalResult::new(name, kind, true, 1.0, "not applicable"),
        }
    }
}

fn keyword_result(name: &str, kind: CheckKind, keywords: &[String], text: &str) -> EvalResult {
    let haystack = text.to_lowercase();
    let missing: Vec<&str> = keywords
        .iter()
        .filter(|k| !haystack.contains(&k.to_lowercase()))
        .map(String::as_str)
        .collect();
    let found = keywords.len() - missing.len();
    let score = if keywords.is_empty() { 1.0 } else { found as f64 / keywords.len() as f64 };
    let passed = keywords.is_empty() || found > 0;
    let message = if missing.is_empty() {
        "all keywords found".to_string()
    } else {
        format!("missing keywords: {}", missing.join(", "))
    };
    EvalResult::new(name, kind, passed, score, message)
}

/// Checks grouped by when they run
#[derive(Debug, Clone, Default)]
pub struct EvalSuite {
    pub name: String,
    checks: Vec<(String, Check)>,
    tool_checks: Vec<(String, Check)>,
    tool_counts: Vec<(String, i32)>,
    final_checks: Vec<(String, Check)>,
}

impl EvalSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_check(&mut self, name: &str, check: Check) -> &mut Self {
        self.checks.push((name.to_string(), check));
        self
    }

    /// Check the arguments of every call to `tool`
    pub fn add_tool_check(&mut self, tool: &str, check: Check) -> &mut Self {
        self.tool_checks.push((tool.to_string(), check));
        self
    }

    /// `expected` calls to `tool` over the run; -1 means at least one
    pub fn add_final_tool_check(&mut self, tool: &str, expected: i32) -> &mut Self {
        self.tool_counts.push((tool.to_string(), expected));
        self
    }

    pub fn add_final_check(&mut self, name: &str, check: Check) -> &mut Self {
        self.final_checks.push((name.to_string(), check));
        self
    }

    /// Processor that only keeps events emitted by `agent`
    pub fn processor(&self, agent: &str) -> EvalProcessor<'_> {
        EvalProcessor {
            suite: self,
            agent: agent.to_string(),
            events: Vec::new(),
        }
    }
}

/// Checks attributed to one model call
#[derive(Debug, Clone, Serialize)]
pub struct CallResult {
    pub call_number: usize,
    pub timestamp: DateTime<Utc>,
    pub pass_rate: f64,
    pub avg_score: f64,
    pub results: Vec<EvalResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalSummary {
    pub suite: String,
    pub results: Vec<EvalResult>,
    pub passed: usize,
    pub total: usize,
    /// Percentage, 0 to 100
    pub pass_rate: f64,
    pub average_score: f64,
    #[serde(serialize_with = "duration_secs")]
    pub total_duration: Duration,
    pub calls: Vec<CallResult>,
}

fn duration_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl EvalSummary {
    pub fn failed(&self) -> impl Iterator<Item = &EvalResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// (accuracy, relevance): mean score of final content checks and of tool argument checks
    pub fn accuracy_relevance(&self) -> (f64, f64) {
        let mean = |kind: CheckKind| {
            let scores: Vec<f64> = self.results.iter().filter(|r| r.kind == kind).map(|r| r.score).collect();
            if scores.is_empty() {
                0.0
            } else {
                scores.iter().sum::<f64>() / scores.len() as f64
            }
        };
        (mean(CheckKind::FinalContent), mean(CheckKind::ToolArguments))
    }
}

fn rates(results: &[EvalResult]) -> (f64, f64) {
    if results.is_empty() {
        return (0.0, 0.0);
    }
    let passed = results.iter().filter(|r| r.passed).count();
    let pass_rate = passed as f64 / results.len() as f64 * 100.0;
    let avg_score = results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64;
    (pass_rate, avg_score)
}

pub struct EvalProcessor<'a> {
    suite: &'a EvalSuite,
    agent: String,
    events: Vec<EvalEvent>,
}

impl EvalProcessor<'_> {
    /// Keep `event` for later evaluation; false when it belongs to another agent
    pub fn process(&mut self, event: &EvalEvent) -> bool {
        if event.agent != self.agent {
            return false;
        }
        self.events.push(event.clone());
        true
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    fn evaluate_call(&self, event: &EvalEvent) -> Vec<EvalResult> {
        let mut results: Vec<EvalResult> = self
            .suite
            .checks
            .iter()
            .map(|(name, check)| check.on_event(name, CheckKind::Universal, event))
            .collect();

        for call in &event.tool_calls {
            let arguments = string_arg(&call.arguments, "input").unwrap_or_else(|| call.arguments.to_string());
            for (tool, check) in self.suite.tool_checks.iter().filter(|(t, _)| *t == call.name) {
                let name = format!("{} arguments", tool);
                results.push(check.on_text(&name, CheckKind::ToolArguments, &arguments));
            }
        }
        results
    }

    pub fn call_results(&self) -> Vec<CallResult> {
        self.events
            .iter()
            .enumerate()
            .map(|(i, event)| {
                let results = self.evaluate_call(event);
                let (pass_rate, avg_score) = rates(&results);
                CallResult {
                    call_number: i + 1,
                    timestamp: event.started_at,
                    pass_rate,
                    avg_score,
                    results,
                }
            })
            .collect()
    }

    fn final_results(&self) -> Vec<EvalResult> {
        let mut results = Vec::new();

        for (tool, expected) in &self.suite.tool_counts {
            let count = self
                .events
                .iter()
                .flat_map(|e| &e.tool_calls)
                .filter(|c| c.name == *tool)
                .count();
            let name = format!("{} usage", tool);
            let (passed, message) = if *expected < 0 {
                (count >= 1, format!("called {} times, expected at least once", count))
            } else {
                (
                    count == *expected as usize,
                    format!("called {} times, expected {}", count, expected),
                )
            };
            results.push(EvalResult::new(
                &name,
                CheckKind::ToolCount,
                passed,
                if passed { 1.0 } else { 0.0 },
                message,
            ));
        }

        let final_content = self.events.iter().rev().find(|e| e.is_final).map(|e| e.content.as_str());
        for (name, check) in &self.suite.final_checks {
            results.push(match final_content {
                Some(content) => check.on_text(name, CheckKind::FinalContent, content),
                None => EvalResult::new(name, CheckKind::FinalContent, false, 0.0, "no final response"),
            });
        }
        results
    }

    pub fn summary(&self) -> EvalSummary {
        let calls = self.call_results();
        let mut results: Vec<EvalResult> = calls.iter().flat_map(|c| c.results.clone()).collect();
        results.extend(self.final_results());

        let passed = results.iter().filter(|r| r.passed).count();
        let (pass_rate, average_score) = rates(&results);

        EvalSummary {
            suite: self.suite.name.clone(),
            total: results.len(),
            passed,
            results,
            pass_rate,
            average_score,
            total_duration: self.events.iter().map(|e| e.duration).sum(),
            calls,
        }
    }
}

/// `1.23s`, or `850ms` below one second
pub fn format_duration(d: Duration) -> String {
    if d < Duration::from_secs(1) {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}
