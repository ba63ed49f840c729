//! Fixed-answer tools the capability checks hand to their agents

use agent_core::tool::string_arg;
use agent_core::{AgentTool, ParameterProperty, ParameterSchema, ToolResult};
use serde_json::Value;

pub const COMPANY_NAME: &str = "Nexxia";
pub const SUPPLIER_NAME: &str = "Phoenix";

pub fn company_name_tool() -> AgentTool {
    AgentTool::new(
        "lookup_company_name",
        "A tool that looks up the name of a company based on a company number",
        ParameterSchema::new().with_required(
            "company_number",
            ParameterProperty::string("The company number to lookup"),
        ),
        |_| Ok(ToolResult::success(COMPANY_NAME)),
    )
}

pub fn supplier_name_tool() -> AgentTool {
    AgentTool::new(
        "lookup_supplier_name",
        "A tool that looks up the name of a supplier based on a supplier number",
        ParameterSchema::new().with_required(
            "supplier_number",
            ParameterProperty::string("The supplier number to lookup"),
        ),
        |_| Ok(ToolResult::success(SUPPLIER_NAME)),
    )
}

fn name_arg(args: &Value) -> String {
    string_arg(args, "name").unwrap_or_default().trim().to_string()
}

pub fn lookup_company_id_tool() -> AgentTool {
    AgentTool::new(
        "lookup_company_id",
        "Lookup a company ID by its name. Returns 'COMPANY_ID: <id>; NAME: <name>' if found, otherwise 'NOT_FOUND'",
        ParameterSchema::new()
            .with_required("name", ParameterProperty::string("The company name to lookup")),
        |args| {
            let content = if name_arg(args).eq_ignore_ascii_case(COMPANY_NAME) {
                format!("COMPANY_ID: COMP-001; NAME: {}", COMPANY_NAME)
            } else {
                "NOT_FOUND".to_string()
            };
            Ok(ToolResult::success(content))
        },
    )
}

pub fn create_company_tool() -> AgentTool {
    AgentTool::new(
        "create_company",
        "Create a new company by name. Returns 'COMPANY_ID: <id>; NAME: <name>'",
        ParameterSchema::new()
            .with_required("name", ParameterProperty::string("The company name to create")),
        |args| {
            let name = name_arg(args);
            let id = if name.eq_ignore_ascii_case(COMPANY_NAME) {
                "COMP-001"
            } else if name.eq_ignore_ascii_case("Contoso") {
                "COMP-CONTOSO-001"
            } else {
                "COMP-NEW-001"
            };
            Ok(ToolResult::success(format!("COMPANY_ID: {}; NAME: {}", id, name)))
        },
    )
}

pub fn create_invoice_tool() -> AgentTool {
    AgentTool::new(
        "create_invoice",
        "Create an invoice for a company. Returns 'INVOICE_ID: <id>; AMOUNT: <amount>'",
        ParameterSchema::new()
            .with_required("company_id", ParameterProperty::string("The company ID to invoice"))
            .with_required("amount", ParameterProperty::number("The invoice amount")),
        |args| {
            let amount = match args.get("amount") {
                Some(Value::Number(n)) => format!("{:.0}", n.as_f64().unwrap_or(0.0)),
                Some(Value::String(s)) => s.clone(),
                _ => "0".to_string(),
            };
            Ok(ToolResult::success(format!(
                "INVOICE_ID: INV-1001; AMOUNT: {}",
                amount
            )))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_company_id() {
        let tool = lookup_company_id_tool();
        assert_eq!(
            tool.call(&json!({"name": " nexxia "})).content,
            "COMPANY_ID: COMP-001; NAME: Nexxia"
        );
        assert_eq!(tool.call(&json!({"name": "Acme"})).content, "NOT_FOUND");
    }

    #[test]
    fn test_create_company_ids() {
        let tool = create_company_tool();
        assert_eq!(
            tool.call(&json!({"name": "Contoso"})).content,
            "COMPANY_ID: COMP-CONTOSO-001; NAME: Contoso"
        );
        assert_eq!(
            tool.call(&json!({"name": "Nexxia"})).content,
            "COMPANY_ID: COMP-001; NAME: Nexxia"
        );
        assert_eq!(
            tool.call(&json!({"name": "Initech"})).content,
            "COMPANY_ID: COMP-NEW-001; NAME: Initech"
        );
    }

    #[test]
    fn test_create_invoice_amount_formats() {
        let tool = create_invoice_tool();
        let call = |amount: Value| tool.call(&json!({"company_id": "COMP-001", "amount": amount})).content;

        assert_eq!(call(json!(100)), "INVOICE_ID: INV-1001; AMOUNT: 100");
        assert_eq!(call(json!(99.6)), "INVOICE_ID: INV-1001; AMOUNT: 100");
        assert_eq!(call(json!("250")), "INVOICE_ID: INV-1001; AMOUNT: 250");
        assert_eq!(call(json!(null)), "INVOICE_ID: INV-1001; AMOUNT: 0");
    }
}
