use itertools::Itertools;
use std::fmt;

const RULE_WIDTH: usize = 78;

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSummary {
    pub name: String,
    pub kind: &'static str,
    /// Output sizes, with -1 standing for the batch dimension.
    pub output_shapes: Vec<Vec<i64>>,
    pub params: i64,
}

impl LayerSummary {
    pub fn new(name: impl Into<String>, kind: &'static str, output_shape: Vec<i64>, params: i64) -> Self {
        LayerSummary {
            name: name.into(),
            kind,
            output_shapes: vec![output_shape],
            params,
        }
    }

    pub fn with_outputs(
        name: impl Into<String>,
        kind: &'static str,
        output_shapes: Vec<Vec<i64>>,
        params: i64,
    ) -> Self {
        LayerSummary {
            name: name.into(),
            kind,
            output_shapes,
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub name: String,
    pub layers: Vec<LayerSummary>,
    pub trainable: i64,
    pub non_trainable: i64,
}

impl Summary {
    pub fn total_params(&self) -> i64 {
        self.trainable + self.non_trainable
    }

    pub fn layer(&self, name: &str) -> Option<&LayerSummary> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn output_shapes(&self) -> &[Vec<i64>] {
        self.layers
            .last()
            .map(|l| l.output_shapes.as_slice())
            .unwrap_or(&[])
    }
}

pub trait Summarize {
    fn summary(&self) -> Summary;
}

fn format_shape(shape: &[i64]) -> String {
    let dims = shape
        .iter()
        .map(|&d| if d < 0 { "None".to_string() } else { d.to_string() })
        .join(", ");
    format!("({dims})")
}

fn format_count(n: i64) -> String {
    let digits = n.abs().to_string();
    let grouped = digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|chunk| String::from_utf8_lossy(chunk))
        .join(",");
    if n < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model: \"{}\"", self.name)?;
        writeln!(f, "{}", "_".repeat(RULE_WIDTH))?;
        writeln!(f, "{:<32}{:<34}{}", "Layer (type)", "Output Shape", "Param #")?;
        writeln!(f, "{}", "=".repeat(RULE_WIDTH))?;
        for layer in &self.layers {
            let label = format!("{} ({})", layer.name, layer.kind);
            let shapes = layer.output_shapes.iter().map(|s| format_shape(s)).join(", ");
            writeln!(f, "{:<32}{:<34}{}", label, shapes, format_count(layer.params))?;
        }
        writeln!(f, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(f, "Total params: {}", format_count(self.total_params()))?;
        writeln!(f, "Trainable params: {}", format_count(self.trainable))?;
        writeln!(f, "Non-trainable params: {}", format_count(self.non_trainable))?;
        write!(f, "{}", "_".repeat(RULE_WIDTH))
    }
}
