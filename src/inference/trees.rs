use crate::error::{ArtifactError, Error, Result};
use crate::inference::Classifier;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
struct EnsembleFile {
    feature_names: Vec<String>,
    classes: Vec<usize>,
    #[serde(default)]
    base_score: f64,
    trees: Vec<TreeFile>,
}

#[derive(Deserialize)]
struct TreeFile {
    class: usize,
    nodes: Vec<NodeFile>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NodeFile {
    Split {
        feature: String,
        threshold: f64,
        yes: usize,
        no: usize,
        #[serde(default)]
        missing: Option<usize>,
    },
    Leaf {
        leaf: f64,
    },
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        yes: usize,
        no: usize,
        missing: usize,
    },
    Leaf(f64),
}

#[derive(Debug, Clone)]
struct Tree {
    class_slot: usize,
    nodes: Vec<Node>,
}

impl Tree {
    fn evaluate(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                    missing,
                } => {
                    let value = features[feature];
                    index = if value.is_nan() {
                        missing
                    } else if value < threshold {
                        yes
                    } else {
                        no
                    };
                }
            }
        }
    }
}

/// Multi-class gradient-boosted tree ensemble with softmax output.
///
/// Each tree contributes to the margin of one class. Splits send a row to
/// `yes` when `value < threshold` and to `missing` (default `yes`) when the
/// value is NaN. Child indices must point forward, so every walk terminates.
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    feature_names: Vec<String>,
    classes: Vec<usize>,
    base_score: f64,
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn from_json(text: &str, origin: &str) -> std::result::Result<Self, ArtifactError> {
        let file: EnsembleFile = serde_json::from_str(text).map_err(|source| ArtifactError::Parse {
            path: origin.to_string(),
            source,
        })?;
        Self::build(file)
    }

    pub fn from_path(path: impl AsRef<Path>) -> std::result::Result<Self, ArtifactError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ArtifactError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text, &path.display().to_string())
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn build(file: EnsembleFile) -> std::result::Result<Self, ArtifactError> {
        if file.classes.is_empty() {
            return Err(ArtifactError::Invalid("ensemble declares no classes".to_string()));
        }

        let feature_index: HashMap<&str, usize> = file
            .feature_names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.as_str(), index))
            .collect();
        if feature_index.len() != file.feature_names.len() {
            return Err(ArtifactError::Invalid(
                "ensemble feature names are not unique".to_string(),
            ));
        }

        let mut trees = Vec::with_capacity(file.trees.len());
        for (tree_index, tree) in file.trees.into_iter().enumerate() {
            let class_slot = file
                .classes
                .iter()
                .position(|class| *class == tree.class)
                .ok_or_else(|| {
                    ArtifactError::Invalid(format!(
                        "tree {} targets undeclared class {}",
                        tree_index, tree.class
                    ))
                })?;
            if tree.nodes.is_empty() {
                return Err(ArtifactError::Invalid(format!("tree {} has no nodes", tree_index)));
            }

            let node_count = tree.nodes.len();
            let mut nodes = Vec::with_capacity(node_count);
            for (node_index, node) in tree.nodes.into_iter().enumerate() {
                let node = match node {
                    NodeFile::Leaf { leaf } => Node::Leaf(leaf),
                    NodeFile::Split {
                        feature,
                        threshold,
                        yes,
                        no,
                        missing,
                    } => {
                        let feature = *feature_index.get(feature.as_str()).ok_or_else(|| {
                            ArtifactError::Invalid(format!(
                                "tree {} splits on unknown feature '{}'",
                                tree_index, feature
                            ))
                        })?;
                        let missing = missing.unwrap_or(yes);
                        for child in [yes, no, missing] {
                            if child <= node_index || child >= node_count {
                                return Err(ArtifactError::Invalid(format!(
                                    "tree {} node {} has invalid child {}",
                                    tree_index, node_index, child
                                )));
                            }
                        }
                        Node::Split {
                            feature,
                            threshold,
                            yes,
                            no,
                            missing,
                        }
                    }
                };
                nodes.push(node);
            }
            trees.push(Tree { class_slot, nodes });
        }

        Ok(Self {
            feature_names: file.feature_names,
            classes: file.classes,
            base_score: file.base_score,
            trees,
        })
    }
}

impl Classifier for TreeEnsemble {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn classes(&self) -> &[usize] {
        &self.classes
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.feature_names.len() {
            return Err(Error::ColumnMismatch(format!(
                "ensemble expects {} features, got {}",
                self.feature_names.len(),
                features.len()
            )));
        }

        let mut margins = vec![self.base_score; self.classes.len()];
        for tree in &self.trees {
            margins[tree.class_slot] += tree.evaluate(features);
        }
        Ok(softmax(&margins))
    }
}

fn softmax(margins: &[f64]) -> Vec<f64> {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = margins.iter().map(|m| (m - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
