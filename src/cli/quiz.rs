//! Interactive terminal quiz

use super::helpers::{build_service, load_lexicon, LexiconArgs};
use lexiquiz_core::{
    error::{McqError, Result},
    BatchGenerator, Item, LearnerId, McqConfig, SenseId, ServedPresentation,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

pub struct QuizOptions {
    pub learner: String,
    pub questions: usize,
    pub senses: Vec<String>,
    pub options: Option<usize>,
    pub persist: bool,
}

/// Run a quiz on stdin/stdout
pub async fn handle(
    config: &McqConfig,
    lexicon_args: &LexiconArgs,
    options: QuizOptions,
    db_path: Option<PathBuf>,
) -> Result<()> {
    let lexicon = load_lexicon(lexicon_args)?;
    let sense_ids: Vec<SenseId> = if options.senses.is_empty() {
        lexicon.sense_ids()
    } else {
        options.senses.iter().map(|id| SenseId::from(id.as_str())).collect()
    };

    let report = BatchGenerator::new(Arc::new(lexicon), config)
        .generate(sense_ids)
        .await?;
    let service = build_service(config, options.persist, db_path).await?;

    let mut items: Vec<Item> = Vec::new();
    for generated in report.generated {
        items.extend(service.publish(generated.pool, generated.items).await?);
    }
    if items.is_empty() {
        return Err(McqError::InvalidInput(
            "no items could be generated from the selected senses".into(),
        ));
    }
    debug!("Quiz over {} items", items.len());

    let learner = LearnerId::new(options.learner.clone());
    let k = options.options.unwrap_or(config.serving.default_k);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut answered = 0;
    let mut correct = 0;

    println!();
    println!("Quiz for {} ({} questions, 'q' to stop)", learner, options.questions);

    for number in 0..options.questions {
        let item = &items[number % items.len()];
        let presentation = match service.select(item.id, &learner, k).await {
            Ok(presentation) => presentation,
            Err(e @ (McqError::InsufficientPool { .. } | McqError::ItemInactive(_))) => {
                warn!("Skipping item {}: {}", item.id, e);
                continue;
            }
            Err(e) => return Err(e),
        };

        print_question(number + 1, options.questions, item, &presentation);
        let started = Instant::now();

        let Some(choice) = read_choice(&mut lines, presentation.displayed_options.len()).await?
        else {
            break;
        };

        let result = service
            .submit(presentation.id, choice, started.elapsed())
            .await?;
        answered += 1;
        if result.is_correct {
            correct += 1;
            println!("  ✓ Correct.");
        } else {
            println!("  ✗ The answer was: {}", result.correct_text);
        }
        println!("  {}", result.explanation);
        println!(
            "  Ability for \"{}\": {:.2} (confidence {:.2})",
            item.word, result.ability_estimate, result.confidence
        );
    }

    println!();
    println!("Score: {}/{}", correct, answered);
    println!();
    Ok(())
}

fn print_question(number: usize, total: usize, item: &Item, presentation: &ServedPresentation) {
    println!();
    println!("Question {}/{} [{}]", number, total, item.item_type);
    println!("  {}", item.question_text);
    if let Some(context) = &item.context {
        println!("    \"{}\"", context);
    }
    for (index, option) in presentation.displayed_options.iter().enumerate() {
        println!("   {}. {}", index + 1, option.text);
    }
}

/// Read a 1-based option number; `None` when the learner quits or input ends
async fn read_choice<R>(
    lines: &mut tokio::io::Lines<R>,
    option_count: usize,
) -> Result<Option<usize>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        match line.parse::<usize>() {
            Ok(choice) if (1..=option_count).contains(&choice) => return Ok(Some(choice - 1)),
            _ => println!("  Enter a number from 1 to {}", option_count),
        }
    }
}
