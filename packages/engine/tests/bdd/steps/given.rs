//! Given step definitions
//!
//! Steps that declare acts and amendment clauses for the scenario batch.

use cucumber::{gherkin::Step, given};
use vigenza_engine::config::parse_date;
use vigenza_engine::types::{RawAct, RawAmendmentClause, RawArticle, RawParagraph};

use crate::world::VigenzaWorld;

fn split_list(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Acts
// =============================================================================

#[given(expr = "the act {string} enacted on {string} with articles:")]
fn declare_act(world: &mut VigenzaWorld, id: String, enacted: String, step: &Step) {
    let table = step.table.as_ref().expect("articles table");
    let articles = table
        .rows
        .iter()
        .skip(1) // header: | article | paragraphs |
        .map(|row| RawArticle {
            number: row[0].clone(),
            suffix: None,
            text: None,
            paragraphs: row
                .get(1)
                .map(|cell| split_list(cell))
                .unwrap_or_default()
                .into_iter()
                .map(|number| RawParagraph {
                    text: format!("Art. {}, comma {}.", row[0], number),
                    number,
                    letters: vec![],
                })
                .collect(),
        })
        .collect();

    world.batch.acts.push(RawAct {
        id,
        title: None,
        enactment_date: parse_date(&enacted).expect("valid enactment date"),
        articles,
    });
}

// =============================================================================
// Clauses
// =============================================================================

fn push_clause(
    world: &mut VigenzaWorld,
    source: String,
    article: String,
    effective: String,
    target: Option<String>,
    step: &Step,
) {
    let text = step.docstring.as_ref().expect("clause text docstring");
    world.batch.clauses.push(RawAmendmentClause {
        source_act_id: source,
        source_article: Some(article),
        destination_text: text.trim().to_string(),
        effective_date: parse_date(&effective).expect("valid effective date"),
        target_act_id: target,
    });
}

#[given(expr = "a clause of {string} article {string} effective {string} amending {string}:")]
fn declare_clause_with_target(
    world: &mut VigenzaWorld,
    source: String,
    article: String,
    effective: String,
    target: String,
    step: &Step,
) {
    push_clause(world, source, article, effective, Some(target), step);
}

#[given(expr = "a clause of {string} article {string} effective {string}:")]
fn declare_clause(
    world: &mut VigenzaWorld,
    source: String,
    article: String,
    effective: String,
    step: &Step,
) {
    push_clause(world, source, article, effective, None, step);
}
