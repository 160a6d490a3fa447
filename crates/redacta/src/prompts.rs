//! Prompt templates for every stage, and assembly of the final request content.
//!
//! Text sources are inlined into the prompt inside `<document>` tags. Binary
//! documents cannot be inlined, so as soon as one is present the prompt is
//! sent as typed parts with each document attached as inline data.

use serde_json::json;

use crate::backend::{Part, PromptContent};
use crate::options::GenerationOptions;
use crate::source::Source;
use crate::thesis::Thesis;

/// Transition phrases the humanizer must not produce
pub const BANNED_PHRASES: &[&str] = &[
  "furthermore",
  "moreover",
  "in conclusion",
  "additionally",
  "it is important to note",
  "in today's world",
  "in summary",
  "delve into",
  "it is worth noting",
  "plays a crucial role",
  "in the realm of",
  "a testament to",
];

/// Build request content for `prompt`, attaching any binary documents
pub fn assemble(sources: &[Source], prompt: String) -> PromptContent {
  let documents: Vec<&Source> = sources.iter().filter(|s| s.is_document()).collect();
  if documents.is_empty() {
    return PromptContent::Text(prompt);
  }

  let mut parts = vec![Part::Text(prompt)];
  for doc in documents {
    parts.push(Part::Text(format!("Attached document: {}", doc.name)));
    parts.push(Part::InlineData { mime_type: doc.mime_type.clone(), data: doc.content.clone() });
  }
  PromptContent::Parts(parts)
}

/// The `<library>` block describing every source
pub fn library_block(sources: &[Source]) -> String {
  if sources.is_empty() {
    return "No sources attached; use general knowledge if the instruction allows it.".to_string();
  }

  sources
    .iter()
    .map(|s| {
      if s.is_document() {
        format!("<document name=\"{}\">(attached below)</document>", s.name)
      } else {
        format!("<document name=\"{}\">\n{}\n</document>", s.name, s.content)
      }
    })
    .collect::<Vec<_>>()
    .join("\n")
}

fn thesis_block(thesis: Option<&Thesis>) -> String {
  match thesis {
    Some(t) => format!(
      "<thesis angle=\"{}\">\n{}\n{}\n</thesis>\n\
       The whole text must defend and develop this thesis.",
      t.angle.label(),
      t.title,
      t.description
    ),
    None => "No thesis was chosen; pick the strongest framing the sources support.".to_string(),
  }
}

fn configuration_block(options: &GenerationOptions) -> String {
  let mut lines = vec![
    format!("- Format: {}", options.format.label()),
    format!("- Tone: {}", options.tone.label()),
    format!("- Target length: {}", options.length.label()),
    format!("- Structure: {}", options.structure.label()),
    format!("- Language: {}", options.language),
  ];
  if options.cross_references {
    lines.push(
      "- Cross-reference the sources: contrast and connect them explicitly, citing each by name."
        .to_string(),
    );
  }
  lines.join("\n")
}

pub fn draft_prompt(
  sources: &[Source],
  instruction: &str,
  options: &GenerationOptions,
  thesis: Option<&Thesis>,
) -> String {
  format!(
    r#"You are a world-class writer and analytical researcher.

You receive two pieces of information:
1. <library>: a collection of documents and sources.
2. <instruction>: the task the user wants performed with that library.

GOAL:
Write the requested text using the library as the factual basis, adapting style and
structure to the configuration below.

CONFIGURATION:
{configuration}

{thesis}

<library>
{library}
</library>

<instruction>
{instruction}
</instruction>

RULES:
1. Cite sources implicitly where it adds authority, without breaking the flow.
2. If the instruction asks for something the sources do not cover, say so or mark the
   information as external.
3. Output strictly valid Markdown."#,
    configuration = configuration_block(options),
    thesis = thesis_block(thesis),
    library = library_block(sources),
    instruction = instruction.trim(),
  )
}

pub fn angles_prompt(sources: &[Source], instruction: &str) -> String {
  format!(
    r#"You are a research strategist. Read the library and the instruction, then propose
exactly 3 distinct strategic angles for the requested text. Each angle needs a short
id, a kind (Analytical, Critical, Comparative or Innovative), a working title and a
two-sentence description of the argument it would make.

<library>
{library}
</library>

<instruction>
{instruction}
</instruction>"#,
    library = library_block(sources),
    instruction = instruction.trim(),
  )
}

pub fn angles_schema() -> serde_json::Value {
  json!({
    "type": "ARRAY",
    "items": {
      "type": "OBJECT",
      "properties": {
        "id": { "type": "STRING" },
        "angle": {
          "type": "STRING",
          "enum": ["Analytical", "Critical", "Comparative", "Innovative"]
        },
        "title": { "type": "STRING" },
        "description": { "type": "STRING" }
      },
      "required": ["id", "angle", "title", "description"]
    }
  })
}

pub fn outline_prompt(
  sources: &[Source],
  instruction: &str,
  thesis: Option<&Thesis>,
  options: &GenerationOptions,
  (min, max): (usize, usize),
) -> String {
  format!(
    r#"You are planning a long-form text. Produce an outline of between {min} and {max}
section titles, in reading order. Return only the titles.

CONFIGURATION:
{configuration}

{thesis}

<library>
{library}
</library>

<instruction>
{instruction}
</instruction>"#,
    configuration = configuration_block(options),
    thesis = thesis_block(thesis),
    library = library_block(sources),
    instruction = instruction.trim(),
  )
}

pub fn outline_schema() -> serde_json::Value {
  json!({ "type": "ARRAY", "items": { "type": "STRING" } })
}

/// Everything one section needs to continue the document coherently
pub struct SectionContext<'a> {
  pub title: &'a str,
  pub index: usize,
  pub outline: &'a [String],
  pub thesis: Option<&'a Thesis>,
  pub previous: &'a str,
  pub sources: &'a [Source],
  pub instruction: &'a str,
  pub options: &'a GenerationOptions,
}

pub fn section_prompt(ctx: &SectionContext<'_>) -> String {
  let outline = ctx
    .outline
    .iter()
    .enumerate()
    .map(|(i, title)| {
      let marker = if i == ctx.index { " <- write this one" } else { "" };
      format!("{}. {title}{marker}", i + 1)
    })
    .collect::<Vec<_>>()
    .join("\n");

  let previous = if ctx.previous.is_empty() {
    "(this is the first section)".to_string()
  } else {
    format!("...{}", ctx.previous)
  };

  format!(
    r#"You are writing one section of a long document. Write ONLY the section
"{title}", starting with a Markdown heading (##). Do not repeat earlier material and do
not anticipate later sections.

OUTLINE:
{outline}

CONFIGURATION:
{configuration}

{thesis}

END OF THE TEXT SO FAR:
{previous}

<library>
{library}
</library>

<instruction>
{instruction}
</instruction>"#,
    title = ctx.title,
    configuration = configuration_block(ctx.options),
    thesis = thesis_block(ctx.thesis),
    library = library_block(ctx.sources),
    instruction = ctx.instruction.trim(),
  )
}

/// Whether the critic rewrites the text or only reports on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CritiqueMode {
  Rewrite { with_report: bool },
  ReportOnly,
}

pub fn critique_prompt(draft: &str, options: &GenerationOptions, mode: CritiqueMode) -> String {
  let task = match mode {
    CritiqueMode::Rewrite { with_report } => {
      let report = if with_report {
        "\nAfter the rewritten text, append a section \"## Critic's report\" listing the main\n\
         weaknesses you fixed and any that remain."
      } else {
        ""
      };
      format!(
        "Rewrite the entire text below. Strengthen the argument structure, make every claim\n\
         earn its place, remove passive voice and filler. Keep the Markdown structure and the\n\
         {} language.{report}\nReturn only the final text.",
        options.language
      )
    }
    CritiqueMode::ReportOnly => {
      "Do NOT rewrite the text. Write a closing section \"## Critic's report\"\n\
       that evaluates argument strength, evidence use, coherence between sections and style,\n\
       with concrete suggestions. Return only that section."
        .to_string()
    }
  };

  format!(
    "You are a demanding academic critic reviewing a {format}.\n\n\
     {task}\n\n<text>\n{draft}\n</text>",
    format = options.format.label(),
  )
}

pub fn humanize_prompt(text: &str, options: &GenerationOptions) -> String {
  let register = match options.style_guide() {
    Some(guide) => {
      format!("Apply this personal style guide verbatim:\n<style_guide>\n{guide}\n</style_guide>")
    }
    None => "Use a natural, confident human register: specific, a little opinionated, \
             never generic."
      .to_string(),
  };

  format!(
    r#"Rewrite the text below so it reads as written by a human author.

RULES:
1. No bullet points or numbered lists: turn them into dense narrative paragraphs.
2. Vary sentence length aggressively. Interleave short fragments with long sentences full
   of subordinate clauses.
3. Never use these phrases: {banned}.
4. Keep every fact, citation, heading and the {language} language.
5. {register}

Return only the rewritten Markdown.

<text>
{text}
</text>"#,
    banned = BANNED_PHRASES.iter().map(|p| format!("\"{p}\"")).collect::<Vec<_>>().join(", "),
    language = options.language,
  )
}

/// Meta-prompt: design the ideal prompt for the task instead of doing it
pub fn optimize_prompt(
  sources: &[Source],
  instruction: &str,
  options: &GenerationOptions,
) -> String {
  let summary = if sources.is_empty() {
    "- (no sources)".to_string()
  } else {
    sources
      .iter()
      .map(|s| format!("- File: {} (content available in the final prompt)", s.name))
      .collect::<Vec<_>>()
      .join("\n")
  };

  format!(
    r#"You are a senior prompt engineer.

TASK:
Analyse the user's request and the available sources, and write the perfect master
prompt that would be sent to an AI to do the work.

USER DATA:
- Available sources:
{summary}
- User instruction: "{instruction}"
- Configuration: tone {tone}, format {format}, length {length}.

EXPECTED OUTPUT:
A Markdown code block containing a highly structured prompt (chain of thought, few-shot
where useful, XML delimiters) with these sections:
1. <role_definition>
2. <task_description>
3. <style_guidelines>
4. <input_data_placeholders> (where the document texts would go)
5. <step_by_step_instructions>

Do not write the text itself. ONLY WRITE THE OPTIMISED PROMPT."#,
    instruction = instruction.trim(),
    tone = options.tone.label(),
    format = options.format.label(),
    length = options.length.label(),
  )
}

pub fn style_guide_prompt(samples: &[String]) -> String {
  let samples = samples
    .iter()
    .enumerate()
    .map(|(i, s)| format!("<sample id=\"{}\">\n{}\n</sample>", i + 1, s.trim()))
    .collect::<Vec<_>>()
    .join("\n");

  format!(
    r#"You are a forensic linguist. Study the writing samples below and describe the
author's style precisely enough that another writer could imitate it: vocabulary and
register, sentence length and rhythm, punctuation habits, paragraph shape, typical
openings and transitions, tone and quirks. Write the guide as direct instructions in
Markdown. Do not quote the samples at length.

{samples}"#
  )
}
