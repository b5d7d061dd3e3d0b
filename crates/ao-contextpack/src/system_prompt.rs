use crate::truncation::{self, Section};

/// A named block of text to fold into the system prompt — a tool
/// catalog render, an operator-supplied preamble, or similar. Each is
/// capped independently before the combined total cap runs, the same
/// two-stage scheme the packer's truncation module applies generally.
pub struct PromptSection {
    pub name: String,
    pub content: String,
}

pub struct SystemPromptBuilder {
    pub max_per_section: usize,
    pub total_max: usize,
}

impl SystemPromptBuilder {
    pub fn new(max_per_section: usize, total_max: usize) -> Self {
        Self { max_per_section, total_max }
    }

    /// Render `preamble` followed by each section, each wrapped in a
    /// `<name>...</name>` block, separated by blank lines.
    pub fn build(&self, preamble: &str, sections: &[PromptSection]) -> String {
        let mut working: Vec<Section> = sections
            .iter()
            .map(|s| {
                let raw_chars = s.content.len();
                let (content, truncated_per_section) = truncation::truncate_per_file(&s.content, self.max_per_section);
                Section { name: s.name.clone(), content, raw_chars, truncated_per_section, truncated_total_cap: false, included: true }
            })
            .collect();

        truncation::apply_total_cap(&mut working, self.total_max);

        let mut out = String::new();
        if !preamble.is_empty() {
            out.push_str(preamble);
            out.push_str("\n\n");
        }
        for section in &working {
            if !section.included {
                continue;
            }
            out.push_str(&format!("<{name}>\n{content}\n</{name}>\n\n", name = section.name, content = section.content));
        }
        out.trim_end().to_string()
    }
}
