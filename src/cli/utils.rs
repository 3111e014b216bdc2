use std::io::{self, BufRead, Write};

use serde_json::{json, Value};

use crate::auth::PrincipalView;
use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(object)) = (data, response.as_object_mut()) {
                object.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(
    output_format: &OutputFormat,
    message: &str,
    error_code: Option<&str>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Print one principal, JSON or aligned text
pub fn output_principal(output_format: &OutputFormat, principal: &PrincipalView) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(principal)?),
        OutputFormat::Text => {
            println!("Username: {}", principal.username);
            println!("Role:     {}", principal.role);
            println!("ID:       {}", principal.id);
            println!("Created:  {}", principal.created_at);
        }
    }
    Ok(())
}

pub fn output_principals(output_format: &OutputFormat, principals: &[PrincipalView]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "users": principals }))?);
        }
        OutputFormat::Text if principals.is_empty() => println!("No users found"),
        OutputFormat::Text => {
            println!("{:<36}  {:<24}  {}", "ID", "USERNAME", "CREATED");
            for p in principals {
                println!("{:<36}  {:<24}  {}", p.id, p.username, p.created_at);
            }
        }
    }
    Ok(())
}

/// Use the given password or read one line from stdin.
pub fn resolve_password(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    print!("Password: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();

    if password.is_empty() {
        return Err(anyhow::anyhow!("Password is required"));
    }
    Ok(password)
}
