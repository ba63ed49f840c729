//! Example tools, some of which need approval before they run

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agent_core::tool::string_arg;
use agent_core::{AgentTool, ParameterProperty, ParameterSchema, Session, ToolResult};
use anyhow::Context;
use chrono::{FixedOffset, Utc};
use serde_json::Value;

fn required(args: &Value, key: &str) -> anyhow::Result<String> {
    string_arg(args, key).with_context(|| format!("{} must be a string", key))
}

pub fn greeting_tool() -> AgentTool {
    AgentTool::new(
        "greeting",
        "A tool that returns a greeting",
        ParameterSchema::new()
            .with_required("name", ParameterProperty::string("The name of the person to greet")),
        |args| match string_arg(args, "name") {
            Some(name) => Ok(ToolResult::success(format!(
                "Result: Hello, {}! Have a nice day!",
                name
            ))),
            None => Ok(ToolResult::error("Error: name must be a string")),
        },
    )
}

pub fn send_email_tool() -> AgentTool {
    AgentTool::new(
        "send_email",
        "Sends an email to a recipient with subject and body. Requires approval before sending.",
        ParameterSchema::new()
            .with_required("to", ParameterProperty::string("Email recipient address"))
            .with_required("subject", ParameterProperty::string("Email subject line"))
            .with_required("body", ParameterProperty::string("Email body content")),
        |args| {
            let to = required(args, "to")?;
            let subject = required(args, "subject")?;
            Ok(ToolResult::success(format!(
                "Email successfully sent to {} with subject '{}'",
                to, subject
            )))
        },
    )
    .with_approval()
}

/// Pretends to delete; nothing is touched on disk
pub fn delete_file_tool() -> AgentTool {
    AgentTool::new(
        "delete_file",
        "Deletes a file from the filesystem. This is a destructive operation that requires approval.",
        ParameterSchema::new()
            .with_required("filepath", ParameterProperty::string("Path to the file to delete"))
            .with_required("reason", ParameterProperty::string("Reason for deleting the file")),
        |args| {
            let filepath = required(args, "filepath")?;
            let reason = required(args, "reason")?;
            Ok(ToolResult::success(format!(
                "File '{}' has been deleted. Reason: {}",
                filepath, reason
            )))
        },
    )
    .with_approval()
}

/// Note shown next to a transfer approval request
pub fn transfer_note(args: &Value) -> String {
    match args.get("amount").and_then(Value::as_f64) {
        None => "Invalid amount format: amount must be a number".to_string(),
        Some(amount) if amount > 10_000.0 => format!("WARNING: Large transaction amount: ${:.2}", amount),
        Some(amount) if amount > 1_000.0 => format!("CAUTION: Moderate transaction amount: ${:.2}", amount),
        Some(amount) => format!("Transaction amount: ${:.2}", amount),
    }
}

pub fn transfer_money_tool() -> AgentTool {
    AgentTool::new(
        "transfer_money",
        "Transfers money from one account to another. Requires approval for amounts over $100.",
        ParameterSchema::new()
            .with_required("from_account", ParameterProperty::string("Source account number"))
            .with_required("to_account", ParameterProperty::string("Destination account number"))
            .with_required("amount", ParameterProperty::number("Amount to transfer in USD"))
            .with_property("memo", ParameterProperty::string("Optional memo for the transaction")),
        |args| {
            let from = required(args, "from_account")?;
            let to = required(args, "to_account")?;
            let amount = args
                .get("amount")
                .and_then(Value::as_f64)
                .context("amount must be a number")?;

            let mut result = format!("Successfully transferred ${:.2} from {} to {}", amount, from, to);
            if let Some(memo) = string_arg(args, "memo").filter(|m| !m.is_empty()) {
                result.push_str(&format!(" (Memo: {})", memo));
            }
            Ok(ToolResult::success(result))
        },
    )
    .with_approval()
}

pub fn query_database_tool() -> AgentTool {
    AgentTool::new(
        "query_database",
        "Queries the database for information. Read-only operation, no approval needed.",
        ParameterSchema::new().with_required("query", ParameterProperty::string("SQL query to execute")),
        |args| {
            let query = required(args, "query")?;
            Ok(ToolResult::success(format!(
                "Query executed: {}\nResults: [{{'id': 1, 'name': 'Sample Data'}}]",
                query
            )))
        },
    )
}

/// Evaluate `a op b` for + - * / ^, or `sqrt n`
pub fn evaluate_expression(expr: &str) -> anyhow::Result<f64> {
    let expr = expr.trim();

    if let Some(rest) = expr.strip_prefix("sqrt") {
        let n: f64 = rest
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid number for sqrt: {}", e))?;
        return Ok(n.sqrt());
    }

    for op in ['+', '-', '*', '/', '^'] {
        if !expr.contains(op) {
            continue;
        }
        let parts: Vec<&str> = expr.split(op).collect();
        if parts.len() != 2 {
            anyhow::bail!("invalid expression format");
        }
        let left: f64 = parts[0]
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid left operand: {}", e))?;
        let right: f64 = parts[1]
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid right operand: {}", e))?;

        return match op {
            '+' => Ok(left + right),
            '-' => Ok(left - right),
            '*' => Ok(left * right),
            '/' if right == 0.0 => anyhow::bail!("division by zero"),
            '/' => Ok(left / right),
            _ => Ok(left.powf(right)),
        };
    }

    anyhow::bail!("unsupported expression format")
}

pub fn calculator_tool() -> AgentTool {
    AgentTool::new(
        "calculator",
        "Performs basic mathematical calculations. Supports +, -, *, /, sqrt, and ^ (power) operations.",
        ParameterSchema::new().with_required(
            "expression",
            ParameterProperty::string(
                "Mathematical expression to evaluate (e.g., '2 + 2', '10 * 5', 'sqrt 16', '2 ^ 3')",
            ),
        ),
        |args| {
            let Some(expr) = string_arg(args, "expression") else {
                return Ok(ToolResult::error("Error: expression must be a string"));
            };
            Ok(match evaluate_expression(&expr) {
                Ok(value) => ToolResult::success(format!("Result: {}", value)),
                Err(e) => ToolResult::error(format!("Error evaluating expression: {}", e)),
            })
        },
    )
}

/// Canned weather derived from the city name
pub fn mock_weather(city: &str, units: &str) -> String {
    const CONDITIONS: [&str; 4] = ["Sunny", "Cloudy", "Rainy", "Partly Cloudy"];

    let fahrenheit = units == "fahrenheit";
    let mut temp = 20 + city.len() % 15;
    if fahrenheit {
        temp = temp * 9 / 5 + 32;
    }
    let unit = if fahrenheit { "°F" } else { "°C" };
    format!(
        "Current weather in {}: {}, {}{}",
        city,
        CONDITIONS[city.len() % CONDITIONS.len()],
        temp,
        unit
    )
}

pub fn weather_tool() -> AgentTool {
    AgentTool::new(
        "get_weather",
        "Gets the current weather for a specified city",
        ParameterSchema::new()
            .with_required("city", ParameterProperty::string("The city name to get weather for"))
            .with_property(
                "units",
                ParameterProperty::string("Temperature units: 'celsius' or 'fahrenheit'")
                    .with_enum(vec!["celsius".to_string(), "fahrenheit".to_string()]),
            ),
        |args| {
            let Some(city) = string_arg(args, "city") else {
                return Ok(ToolResult::error("Error: city must be a string"));
            };
            let units = string_arg(args, "units").unwrap_or_else(|| "celsius".to_string());
            Ok(ToolResult::success(mock_weather(&city, &units)))
        },
    )
}

/// Standard-time UTC offset for a handful of IANA zones (no daylight saving)
pub fn zone_offset(timezone: &str) -> Option<FixedOffset> {
    let hours = match timezone {
        "UTC" | "Etc/UTC" | "Europe/London" => 0,
        "Europe/Paris" | "Europe/Berlin" | "Europe/Madrid" => 1,
        "Asia/Kolkata" => return FixedOffset::east_opt(5 * 3600 + 1800),
        "Asia/Shanghai" | "Asia/Singapore" => 8,
        "Asia/Tokyo" => 9,
        "Australia/Sydney" => 10,
        "America/New_York" | "America/Toronto" => -5,
        "America/Chicago" => -6,
        "America/Denver" => -7,
        "America/Los_Angeles" => -8,
        _ => return None,
    };
    FixedOffset::east_opt(hours * 3600)
}

pub fn current_time_tool() -> AgentTool {
    AgentTool::new(
        "get_current_time",
        "Gets the current time in a specified timezone",
        ParameterSchema::new().with_required(
            "timezone",
            ParameterProperty::string(
                "IANA timezone name (e.g., 'America/New_York', 'Europe/London', 'Asia/Tokyo')",
            ),
        ),
        |args| {
            let Some(timezone) = string_arg(args, "timezone") else {
                return Ok(ToolResult::error("Error: timezone must be a string"));
            };
            let Some(offset) = zone_offset(&timezone) else {
                return Ok(ToolResult::error(format!(
                    "Error: invalid timezone '{}'. Use IANA timezone names like 'America/New_York'",
                    timezone
                )));
            };
            let now = Utc::now().with_timezone(&offset);
            Ok(ToolResult::success(format!(
                "Current time in {}: {} (UTC{})",
                timezone,
                now.format("%A, %B %-d, %Y at %-I:%M %p"),
                offset
            )))
        },
    )
}

/// Fails for `database` and `api`, healthy otherwise
pub fn check_status_tool() -> AgentTool {
    AgentTool::new(
        "check_status",
        "Checks system status (may fail)",
        ParameterSchema::new().with_required("service", ParameterProperty::string("Service name to check")),
        |args| {
            let service = string_arg(args, "service").unwrap_or_default();
            match service.as_str() {
                "database" => {
                    anyhow::bail!("database connection failed: timeout after 5s. This is a recoverable error")
                }
                "api" => anyhow::bail!("API service check failed: internal error"),
                _ => Ok(ToolResult::success(format!("{} service is healthy", service))),
            }
        },
    )
}

pub fn generate_number_tool() -> AgentTool {
    AgentTool::new(
        "generate_number",
        "Generates a random-looking number",
        ParameterSchema::new(),
        |_| Ok(ToolResult::success(format!("Generated number: {}", Utc::now().timestamp() % 100))),
    )
}

/// Fails on its first call, succeeds afterwards; `calls` counts invocations
pub fn flaky_service_tool(calls: Arc<AtomicUsize>) -> AgentTool {
    AgentTool::new(
        "flaky_service",
        "A service that fails sometimes but eventually succeeds",
        ParameterSchema::new(),
        move |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            println!("  [Tool call #{}]", n);
            if n == 1 {
                anyhow::bail!("temporary network error");
            }
            Ok(ToolResult::success("Service responded successfully!"))
        },
    )
}

/// Refuses to run once `session` is cancelled
pub fn fetch_data_tool(session: Session) -> AgentTool {
    AgentTool::new(
        "fetch_data",
        "Fetches data from a database or API",
        ParameterSchema::new().with_required("query", ParameterProperty::string("The data query to execute")),
        move |args| {
            if session.is_cancelled() {
                anyhow::bail!("session {} was cancelled", session.id());
            }
            let query = required(args, "query")?;
            Ok(ToolResult::success(format!("Query '{}' returned 42 results", query)))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_greeting() {
        let tool = greeting_tool();
        assert_eq!(
            tool.call(&json!({"name": "Nexxia"})).content,
            "Result: Hello, Nexxia! Have a nice day!"
        );
        assert!(tool.call(&json!({})).is_error);
    }

    #[test]
    fn test_approval_flags() {
        assert!(send_email_tool().require_approval);
        assert!(delete_file_tool().require_approval);
        assert!(transfer_money_tool().require_approval);
        assert!(!query_database_tool().require_approval);
    }

    #[test]
    fn test_transfer() {
        let result = transfer_money_tool().call(&json!({
            "from_account": "123-456-789",
            "to_account": "987-654-321",
            "amount": 5000,
            "memo": "Monthly payment"
        }));
        assert_eq!(
            result.content,
            "Successfully transferred $5000.00 from 123-456-789 to 987-654-321 (Memo: Monthly payment)"
        );

        let bad = transfer_money_tool().call(&json!({"from_account": "a", "to_account": "b", "amount": "lots"}));
        assert!(bad.is_error);
        assert_eq!(bad.content, "Error: amount must be a number");
    }

    #[test]
    fn test_transfer_note() {
        assert_eq!(transfer_note(&json!({"amount": 20000})), "WARNING: Large transaction amount: $20000.00");
        assert_eq!(transfer_note(&json!({"amount": 5000})), "CAUTION: Moderate transaction amount: $5000.00");
        assert_eq!(transfer_note(&json!({"amount": 250.5})), "Transaction amount: $250.50");
        assert!(transfer_note(&json!({})).starts_with("Invalid amount"));
    }

    #[test]
    fn test_evaluate_expression() {
        assert_eq!(evaluate_expression("15 * 23").unwrap(), 345.0);
        assert_eq!(evaluate_expression("sqrt 144").unwrap(), 12.0);
        assert_eq!(evaluate_expression(" 2 ^ 3 ").unwrap(), 8.0);
        assert_eq!(evaluate_expression("7 / 2").unwrap(), 3.5);
        assert_eq!(evaluate_expression("1 / 0").unwrap_err().to_string(), "division by zero");
        assert_eq!(
            evaluate_expression("15 * 23 + 100").unwrap_err().to_string().split(':').next(),
            Some("invalid left operand")
        );
        assert!(evaluate_expression("hello").is_err());
    }

    #[test]
    fn test_calculator_formats_like_a_number() {
        let tool = calculator_tool();
        assert_eq!(tool.call(&json!({"expression": "10 * 5"})).content, "Result: 50");
        assert_eq!(tool.call(&json!({"expression": "7 / 2"})).content, "Result: 3.5");
        let bad = tool.call(&json!({"expression": "1 / 0"}));
        assert!(bad.is_error);
        assert_eq!(bad.content, "Error evaluating expression: division by zero");
    }

    #[test]
    fn test_mock_weather() {
        assert_eq!(mock_weather("Tokyo", "celsius"), "Current weather in Tokyo: Cloudy, 25°C");
        assert_eq!(mock_weather("Paris", "fahrenheit"), "Current weather in Paris: Cloudy, 77°F");
        assert_eq!(
            weather_tool().call(&json!({"city": "London"})).content,
            "Current weather in London: Rainy, 26°C"
        );
    }

    #[test]
    fn test_current_time() {
        assert_eq!(zone_offset("Asia/Tokyo"), FixedOffset::east_opt(9 * 3600));
        assert_eq!(zone_offset("America/New_York"), FixedOffset::west_opt(5 * 3600));
        assert!(zone_offset("Mars/Olympus").is_none());

        let ok = current_time_tool().call(&json!({"timezone": "Australia/Sydney"}));
        assert!(!ok.is_error);
        assert!(ok.content.starts_with("Current time in Australia/Sydney: "));
        assert!(ok.content.ends_with("(UTC+10:00)"));

        let bad = current_time_tool().call(&json!({"timezone": "Mars/Olympus"}));
        assert!(bad.is_error);
        assert!(bad.content.starts_with("Error: invalid timezone 'Mars/Olympus'"));
    }

    #[test]
    fn test_tool_errors_become_results() {
        let tool = check_status_tool();
        let db = tool.call(&json!({"service": "database"}));
        assert!(db.is_error);
        assert!(db.content.starts_with("Error: database connection failed"));
        assert_eq!(tool.call(&json!({"service": "cache"})).content, "cache service is healthy");
    }

    #[test]
    fn test_flaky_service_recovers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tool = flaky_service_tool(calls.clone());
        assert_eq!(tool.call(&json!({})).content, "Error: temporary network error");
        assert_eq!(tool.call(&json!({})).content, "Service responded successfully!");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fetch_data_stops_after_cancel() {
        let session = Session::with_id("s1");
        let tool = fetch_data_tool(session.clone());
        assert_eq!(
            tool.call(&json!({"query": "activity"})).content,
            "Query 'activity' returned 42 results"
        );
        session.cancel();
        assert_eq!(tool.call(&json!({"query": "activity"})).content, "Error: session s1 was cancelled");
    }
}
