//! Outbound prompt construction for the reasoning service

/// System instruction template. The rule set asks for read-only output over
/// the one allowed table and strict JSON; that is a best-effort instruction
/// to the service, not an enforcement boundary — the safety gate is.
const SYSTEM_TEMPLATE: &str = r#"You are a data analyst copilot.
You must output STRICT JSON only, with keys:
- answer (string)
- query (string or null)
- chart (object or null). Example: {"type":"bar","x":"col1","y":"metric"}

Rules:
- If you produce a query: ONLY SELECT/WITH. No write operations.
- The query must read the table: {table_name}
- Use only these columns: {columns}
- Prefer aggregations; avoid returning huge raw row sets."#;

const USER_TEMPLATE: &str = r#"User question:
{prompt}

Table: {table_name}
Columns: {columns}

Sample CSV (first rows):
{sample_csv}"#;

/// Inputs for one planning request.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub prompt: &'a str,
    pub table_name: &'a str,
    pub columns: &'a [String],
    pub sample_csv: &'a str,
}

impl PromptContext<'_> {
    /// Render the system instruction.
    pub fn system(&self) -> String {
        SYSTEM_TEMPLATE
            .replace("{table_name}", self.table_name)
            .replace("{columns}", &self.columns.join(", "))
    }

    /// Render the user content.
    pub fn user(&self) -> String {
        USER_TEMPLATE
            .replace("{prompt}", self.prompt)
            .replace("{table_name}", self.table_name)
            .replace("{columns}", &self.columns.join(", "))
            .replace("{sample_csv}", self.sample_csv)
    }
}
