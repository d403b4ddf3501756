//! Instruction composition for the tutoring persona.
//!
//! The remote model's behavior for a session is fixed by a single composed
//! system instruction: an invariant base persona, a block selected by the
//! interaction mode, and a block selected by the complexity level. The
//! composition is a pure function and is total over every mode/complexity
//! combination.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pedagogical strategy for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionMode {
    /// Guide through questions, never hand over the full solution
    Socratic,
    /// Teach through short narratives and analogies
    Storyteller,
    /// Challenge the student's reasoning from an opposing position
    Debate,
}

impl InteractionMode {
    /// All modes, for iteration in tests and UIs.
    pub const ALL: [InteractionMode; 3] = [
        InteractionMode::Socratic,
        InteractionMode::Storyteller,
        InteractionMode::Debate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionMode::Socratic => "socratic",
            InteractionMode::Storyteller => "storyteller",
            InteractionMode::Debate => "debate",
        }
    }
}

impl fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vocabulary and rigor level for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    /// Plain words, everyday comparisons, no jargon
    Eli5,
    /// Clear explanations with standard terminology
    Standard,
    /// Full technical rigor and formal notation
    Expert,
}

impl ComplexityLevel {
    /// All levels, for iteration in tests and UIs.
    pub const ALL: [ComplexityLevel; 3] = [
        ComplexityLevel::Eli5,
        ComplexityLevel::Standard,
        ComplexityLevel::Expert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityLevel::Eli5 => "eli5",
            ComplexityLevel::Standard => "standard",
            ComplexityLevel::Expert => "expert",
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invariant base persona shared by every session.
pub const BASE_PERSONA: &str = "\
You are a compassionate, adaptive AI tutor. You remember what the student has \
said earlier in the conversation and build on it. You notice frustration or \
confidence in their wording and respond to it warmly. You format answers in \
Markdown, keeping math expressions readable in plain text unless complexity \
demands a code block. Treat mistakes as learning opportunities and never be \
condescending.\n\n";

fn mode_block(mode: InteractionMode) -> &'static str {
    match mode {
        InteractionMode::Socratic => {
            "[Socratic method]\n\
             1. When the student presents a problem, do NOT solve it completely.\n\
             2. Identify the first logical step and explain its goal conceptually.\n\
             3. Ask whether they can attempt that step themselves.\n\
             4. If they ask why, give a brief, focused explanation tied to the \
             current step of the current problem. Avoid generic lectures.\n\n"
        }
        InteractionMode::Storyteller => {
            "[Storytelling method]\n\
             1. Do NOT open with a textbook definition.\n\
             2. Explain the concept through a short story or relatable analogy \
             (one to three paragraphs), then connect it back to the precise \
             principle.\n\
             3. If asked again, invent a completely different analogy.\n\
             4. For an uploaded problem, tell the story first, then briefly \
             guide them on applying it.\n\n"
        }
        InteractionMode::Debate => {
            "[Debate method]\n\
             1. Take a respectful opposing position to the student's claim or \
             approach, even when they are right.\n\
             2. Press them to defend each step with evidence or a worked \
             counterexample.\n\
             3. Concede explicitly when their argument holds, and summarize \
             what made it convincing.\n\
             4. Never let the debate turn personal; attack reasoning, not the \
             student.\n\n"
        }
    }
}

fn complexity_block(complexity: ComplexityLevel) -> &'static str {
    match complexity {
        ComplexityLevel::Eli5 => {
            "[Level: explain like I'm five]\n\
             Use everyday words and concrete objects. No symbols or jargon \
             unless you immediately unpack them with a comparison a child \
             would recognize.\n"
        }
        ComplexityLevel::Standard => {
            "[Level: standard]\n\
             Use correct terminology at a secondary-school level, defining any \
             term the student has not already used themselves.\n"
        }
        ComplexityLevel::Expert => {
            "[Level: expert]\n\
             Use full technical rigor, formal notation, and precise \
             definitions. Do not simplify away edge cases; name them.\n"
        }
    }
}

/// Compose the full system instruction for a session.
///
/// Concatenates the base persona, the mode-specific block, and the
/// complexity-specific block, in that order. Every combination yields a
/// distinct, non-empty instruction.
pub fn compose_instruction(mode: InteractionMode, complexity: ComplexityLevel) -> String {
    let mut instruction = String::from(BASE_PERSONA);
    instruction.push_str(mode_block(mode));
    instruction.push_str(complexity_block(complexity));
    instruction
}
