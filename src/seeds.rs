//! Seed data and small builders for questions that are not in a concept's pool.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::domain::{
  CognitiveLevel, Concept, ConceptMetadata, Difficulty, ExpectedResponse, ParsingConfidence, Question,
  QuestionPools, QuestionType, Remediation, SubConcept,
};

pub const SEED_CONCEPT_ID: &str = "natural-selection-adaptive";

/// The diagnostic question is built from the concept's prompt; it is open and neutral.
pub fn diagnostic_question(concept: &Concept) -> Question {
  Question {
    id: "diagnostic".into(),
    text: concept.diagnostic_prompt.clone(),
    question_type: QuestionType::Diagnostic,
    difficulty: Difficulty::Intermediate,
    target_statements: vec![],
    cognitive_level: CognitiveLevel::Analyze,
    expected_response: None,
    remediation: Some(Remediation {
      hint: "There's no right or wrong answer here. Just tell me what stands out to you most about this topic.".into(),
      simplified_text: Some("In simple terms, what is the main idea of this topic?".into()),
      example_answer: Some(
        "For example, you could say: 'The most important thing is that nature selects the strongest animals.'".into(),
      ),
    }),
  }
}

/// Absolute last resort when a pool has nothing for the requested stage.
pub fn open_ended_question(question_type: QuestionType, difficulty: Difficulty) -> Question {
  Question {
    id: format!("fallback_{}", Uuid::new_v4()),
    text: "You've covered all the planned questions for this topic! Tell me, what was the most interesting thing you learned?".into(),
    question_type,
    difficulty,
    target_statements: vec![],
    cognitive_level: CognitiveLevel::Analyze,
    expected_response: None,
    remediation: None,
  }
}

pub fn default_diagnostic_prompt(title: &str) -> String {
  format!("What do you already know about {}? I'd love to hear your thoughts!", title)
}

#[allow(clippy::too_many_arguments)]
fn q(
  id: &str,
  text: &str,
  question_type: QuestionType,
  difficulty: Difficulty,
  target_statements: &[usize],
  cognitive_level: CognitiveLevel,
  length_range: (u32, u32),
  key_terms: &[&str],
  remediation: [&str; 3],
) -> Question {
  Question {
    id: id.into(),
    text: text.into(),
    question_type,
    difficulty,
    target_statements: target_statements.to_vec(),
    cognitive_level,
    expected_response: Some(ExpectedResponse {
      length_range,
      key_terms: key_terms.iter().map(|s| s.to_string()).collect(),
    }),
    remediation: Some(Remediation {
      hint: remediation[0].into(),
      simplified_text: Some(remediation[1].into()),
      example_answer: Some(remediation[2].into()),
    }),
  }
}

/// Built-in concept that keeps the service usable without config or a provider.
pub fn seed_concepts() -> Vec<Concept> {
  use CognitiveLevel::*;
  use Difficulty::*;
  use QuestionType::*;

  let mut connection = BTreeMap::new();
  connection.insert(Basic, q(
    "q_conn_basic_1",
    "In your own words, how is natural selection similar to a filter?",
    Connection, Basic, &[0, 2], Understand, (15, 30),
    &["filter", "traits", "survive", "environment"],
    [
      "Think about what a filter does - it keeps some things and lets others pass through. In nature, what 'passes through' to the next generation?",
      "Imagine nature is like a sieve. How does it decide which animals survive?",
      "Natural selection is like a filter because the environment 'filters out' animals with bad traits, so only the ones with good traits survive and reproduce.",
    ],
  ));
  connection.insert(Intermediate, q(
    "q_conn_int_1",
    "Explain the causal link between an organism's traits and its reproductive success in a specific environment.",
    Connection, Intermediate, &[0, 1], Analyze, (30, 60),
    &["advantageous", "reproduce", "offspring", "generations"],
    [
      "Focus on 'advantage'. If a trait helps an animal survive longer, what does that mean for its ability to have babies?",
      "How does having a helpful trait (like sharp claws) actually lead to having more babies?",
      "If an organism has a helpful trait for its environment, it lives longer and is healthier. This means it has more time and energy to reproduce, passing that trait on.",
    ],
  ));
  connection.insert(Advanced, q(
    "q_conn_adv_1",
    "Critique the phrase 'survival of the fittest' based on your understanding of natural selection. What nuance does it miss?",
    Connection, Advanced, &[0, 1, 2], Evaluate, (50, 100),
    &["reproduction", "context", "environment", "population"],
    [
      "Survival is only half the battle. If a 'fit' animal survives but doesn't have offspring, did it win the evolutionary game?",
      "Why is 'survival of the fittest' not completely accurate? What is more important than just surviving?",
      "The phrase is misleading because evolution isn't just about being strong or surviving. It's about reproduction. A 'fit' animal that doesn't reproduce contributes nothing to the next generation.",
    ],
  ));

  let mut application = BTreeMap::new();
  application.insert(Basic, q(
    "q_app_basic_1",
    "Imagine a population of beetles where some are green and some are brown. If birds can see the green ones more easily on brown bark, what will happen to the population over time?",
    Application, Basic, &[0, 2], Apply, (20, 40),
    &["brown", "survive", "more common", "green eaten"],
    [
      "If the green beetles get eaten, they can't have babies. Who is left to have babies?",
      "Birds eat the green beetles because they stand out. What color will most beetles be in the future?",
      "Since the birds eat the green beetles, mostly brown beetles will survive. They will have brown beetle babies, so the population will become mostly brown.",
    ],
  ));
  application.insert(Intermediate, q(
    "q_app_int_1",
    "A new predator is introduced that hunts only at night. How might this environmental change affect the traits of a prey population over several generations?",
    Application, Intermediate, &[1, 2], Apply, (40, 70),
    &["night vision", "camouflage", "behavior", "selection pressure"],
    [
      "The environment changed (night danger). What traits would help an animal survive in the dark?",
      "A predator now hunts at night. What changes might we see in the prey animals after many years?",
      "The prey might evolve better night vision, darker colors for camouflage at night, or they might start sleeping at night and being active during the day to avoid the predator.",
    ],
  ));
  application.insert(Advanced, q(
    "q_app_adv_1",
    "Consider a species that reproduces asexually versus one that reproduces sexually. Evaluate how natural selection would operate differently on these two populations during a rapid environmental change.",
    Application, Advanced, &[1, 2], Evaluate, (60, 120),
    &["variation", "adaptation rate", "mutation", "risk"],
    [
      "Think about genetic variation. Sexual reproduction mixes genes (creating variety). Asexual creates clones. Which group can adapt faster?",
      "Which group can change faster to survive a new danger: clones (asexual) or mixed-gene families (sexual)? Why?",
      "Sexual reproduction creates more variation, so there's a higher chance some individuals will have the right traits to survive the change. Asexual populations are clones, so if one is vulnerable, they all might be.",
    ],
  ));

  vec![Concept {
    id: SEED_CONCEPT_ID.into(),
    title: "Natural Selection".into(),
    snippet: "How organisms with advantageous traits come to dominate a population over generations.".into(),
    confidence: 3,
    source_text_snippet: "Evolution is the process of change... proposed the theory of natural selection... organisms with traits better suited to their environment tend to survive and reproduce more successfully.".into(),
    core_statements: vec![
      "Natural selection is the process where organisms with advantageous traits are more likely to survive and reproduce.".into(),
      "Over generations, this leads to the accumulation of beneficial traits within a population.".into(),
      "The environment acts as the selective pressure driving this change.".into(),
    ],
    question_pools: QuestionPools { connection, application },
    diagnostic_prompt: "Thinking about how nature 'selects' traits, what is the most important thing to understand about how this process works?".into(),
    estimated_difficulty: Intermediate,
    parsing_confidence: ParsingConfidence::High,
    sub_concepts: vec![
      SubConcept { id: "sc_variation".into(), title: "Genetic Variation".into(), completed: true, difficulty: Some(Basic) },
      SubConcept { id: "sc_selection".into(), title: "Selective Pressure".into(), completed: false, difficulty: Some(Intermediate) },
      SubConcept { id: "sc_adaptation".into(), title: "Adaptation".into(), completed: false, difficulty: Some(Advanced) },
      SubConcept { id: "sc_inheritance".into(), title: "Heritability".into(), completed: false, difficulty: Some(Intermediate) },
    ],
    metadata: Some(ConceptMetadata {
      text_complexity_score: 0.6,
      concept_density: 0.7,
      subject_area: "science".into(),
    }),
  }]
}
