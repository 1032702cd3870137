//! Prompt sent with every invoice image.
//!
//! The template is already in the model's chat format (Qwen2.5-VL), with a
//! single `{instruction}` slot. The instruction shows the target JSON by
//! example; it is not parsed by the pipeline.

use crate::error::ConfigError;

/// Placeholder replaced by the instruction block.
pub const INSTRUCTION_SLOT: &str = "{instruction}";

/// Qwen2.5-VL instruct chat template with one image.
pub const QWEN_25_VL_INSTRUCT_TEMPLATE: &str = concat!(
    "<|im_start|>system\nYou are a helpful assistant.<|im_end|>\n",
    "<|im_start|>user\n<|vision_start|><|image_pad|><|vision_end|>",
    "{instruction}<|im_end|>\n",
    "<|im_start|>assistant\n",
);

/// Extraction instruction with an example of the expected output.
pub const INVOICE_INSTRUCTION: &str = r#"Extract the data from this invoice.
Return your response as a valid JSON object.

Here's an example of the expected JSON output:

{
    "invoiced_date": "21/08/2024",
    "due_date": "21/08/2024",
    "invoice_number": "405027",
    "po_number": "3180",
    "from_info": {
        "name": "Akins Ford Chrysler Dodge Jeep Ram",
        "phone_number": "(770) 867-9137",
        "address": {
            "street": "220 W May St.",
            "city": "Winder, GA",
            "country": "US"
        }
    },
    "to_info": {
        "name": "Allatoona Diesel RT-17",
        "phone_number": "(803) 480-2944",
        "address": {
            "street": "4131 S Main St",
            "city": "Acworth, GA",
            "country": "US"
        }
    },
    "line_items": [
        {
            "part_number": "4C3Z9P456AJ",
            "description": "COOLER - EGR",
            "bin_location": "1030A",
            "unit_price": 347.60,
            "quantity_ordered": 2,
            "quantity_shipped": 0,
            "amount": 0.00
        },
        {
            "part_number": "3C3Z9439AA",
            "description": "GASKET - INTAKE",
            "bin_location": "35D",
            "unit_price": 28.05,
            "quantity_ordered": 1,
            "quantity_shipped": 2,
            "amount": 56.10
        }
    ],
    "payment_method": "Credit Cards",
    "amount": {
        "sub_total": 279.01,
        "total": 279.01,
        "vat": 0.0,
        "currency": "USD",
        "core_charge": 30.00,
        "sales_tax": 0.00
    }
}"#;

/// A chat template with one instruction slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Wrap a template; it must contain the instruction slot exactly once.
    pub fn new(template: impl Into<String>) -> Result<Self, ConfigError> {
        let template = template.into();
        match template.matches(INSTRUCTION_SLOT).count() {
            1 => Ok(Self { template }),
            n => Err(ConfigError::Invalid {
                field: "prompt template".to_string(),
                reason: format!("expected one {} slot, found {}", INSTRUCTION_SLOT, n),
            }),
        }
    }

    /// The Qwen2.5-VL instruct template.
    pub fn qwen_25_vl() -> Self {
        Self {
            template: QWEN_25_VL_INSTRUCT_TEMPLATE.to_string(),
        }
    }

    /// Substitute the instruction block.
    pub fn render(&self, instruction: &str) -> String {
        self.template.replacen(INSTRUCTION_SLOT, instruction, 1)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::qwen_25_vl()
    }
}

/// The prompt used for invoice extraction.
pub fn invoice_prompt() -> String {
    PromptTemplate::default().render(INVOICE_INSTRUCTION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_invoice_prompt() {
        let prompt = invoice_prompt();
        assert!(prompt.starts_with("<|im_start|>system\n"));
        assert!(prompt.contains("<|vision_end|>Extract the data from this invoice."));
        assert!(prompt.ends_with("}<|im_end|>\n<|im_start|>assistant\n"));
        assert!(!prompt.contains(INSTRUCTION_SLOT));
    }

    #[test]
    fn test_template_requires_one_slot() {
        assert!(PromptTemplate::new("no slot").is_err());
        assert!(PromptTemplate::new("{instruction}{instruction}").is_err());

        let template = PromptTemplate::new("[{instruction}]").unwrap();
        assert_eq!(template.render("x"), "[x]");
    }

    #[test]
    fn test_instruction_braces_survive_rendering() {
        // The instruction itself contains braces; only the slot is replaced.
        let rendered = PromptTemplate::new("<{instruction}>").unwrap().render("{\"a\": 1}");
        assert_eq!(rendered, "<{\"a\": 1}>");
    }
}
