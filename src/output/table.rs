use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::initializer::{InitReport, Outcome};
use crate::schema::SchemaPlan;
use crate::verify::{IndexStatus, SchemaReport};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn outcome_cell(outcome: Outcome) -> Cell {
    match outcome {
        Outcome::Created => Cell::new("CREATED").fg(Color::Green),
        Outcome::Existing => Cell::new("EXISTING"),
        Outcome::WouldCreate => Cell::new("WOULD CREATE").fg(Color::Yellow),
    }
}

fn unique_label(unique: bool) -> &'static str {
    if unique {
        "yes"
    } else {
        "no"
    }
}

pub fn render_init_table(report: &InitReport) -> String {
    let mut table = new_table();
    table.set_header(vec!["Collection", "Index", "Keys", "Unique", "Result"]);
    for c in &report.collections {
        table.add_row(Row::from(vec![
            Cell::new(&c.name),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("-"),
            outcome_cell(c.outcome),
        ]));
        for i in &c.indexes {
            table.add_row(Row::from(vec![
                Cell::new(&c.name),
                Cell::new(&i.name),
                Cell::new(&i.keys),
                Cell::new(unique_label(i.unique)),
                outcome_cell(i.outcome),
            ]));
        }
    }
    table.to_string()
}

pub fn render_verify_table(report: &SchemaReport) -> String {
    let mut table = new_table();
    table.set_header(vec!["Collection", "Exists", "Index", "Keys", "Status"]);
    for c in &report.collections {
        let exists = if c.exists {
            Cell::new("YES").fg(Color::Green)
        } else {
            Cell::new("NO").fg(Color::Red)
        };
        for i in &c.indexes {
            let status = match &i.status {
                IndexStatus::Present { name } => Cell::new(format!("OK ({name})")).fg(Color::Green),
                IndexStatus::UniquenessMismatch { name, expected, .. } => Cell::new(format!(
                    "{name}: unique should be {}",
                    unique_label(*expected)
                ))
                .fg(Color::Yellow),
                IndexStatus::OptionsMismatch { name, options } => {
                    Cell::new(format!("{name}: {}", options.join(", "))).fg(Color::Yellow)
                }
                IndexStatus::Missing => Cell::new("MISSING").fg(Color::Red),
            };
            table.add_row(Row::from(vec![
                Cell::new(&c.name),
                exists.clone(),
                Cell::new(&i.expected_name),
                Cell::new(&i.keys),
                status,
            ]));
        }
    }
    table.to_string()
}

pub fn render_plan_table(plan: &SchemaPlan) -> String {
    let mut table = new_table();
    table.set_header(vec!["Collection", "Index", "Keys", "Unique"]);
    for c in &plan.collections {
        for i in &c.indexes {
            table.add_row(vec![
                c.name.clone(),
                i.name(),
                i.describe_keys(),
                unique_label(i.unique).to_string(),
            ]);
        }
    }
    table.to_string()
}
