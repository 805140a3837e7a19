/// Persona and output contract sent as the system turn of every completion.
pub const CULTURAL_SYSTEM: &str = include_str!("../data/prompts/cultural_system.txt");
