//! Rules whose verdict depends on build stages.
//!
//! Each rule keeps its own view of the stages it has seen. Rules that inherit a property
//! through `FROM <alias>` (a cleaned cache, a declared HEALTHCHECK, a WORKDIR) keep a
//! [`StageChain`] whose payload is copied from the parent stage when a stage opens.

mod aliases;
mod inherited;
mod per_stage;

pub use aliases::{
    CopyFromKnownStage, CopyFromOtherStage, FromFirst, TrustedRegistries, UniqueStageAliases,
    UntaggedImage,
};
pub use inherited::{
    AptListsCleanup, CopyRelativeWorkdir, HealthcheckPresent, PipNoCacheDir, RequiredLabels,
};
pub use per_stage::{
    ConsecutiveRun, EnvSelfReference, NoRootUser, OncePerStage, PipefailBeforePipe, WgetOrCurl,
};

use crate::dockerfile::BaseImage;

/// One `FROM` segment as seen by a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage<T> {
    /// Line of the FROM instruction
    pub line: usize,
    /// Lower-cased alias
    pub alias: Option<String>,
    /// Index of the earlier stage this one is built `FROM`
    pub parent: Option<usize>,
    pub data: T,
}

/// Stages in definition order with a per-stage payload inherited through `FROM <alias>`.
#[derive(Debug, Clone, PartialEq)]
pub struct StageChain<T> {
    stages: Vec<Stage<T>>,
}

impl<T> Default for StageChain<T> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<T: Clone + Default> StageChain<T> {
    /// Opens a new stage. When the base image names an earlier stage, the payload starts
    /// as a copy of that stage's payload.
    pub fn enter(&mut self, line: usize, base: &BaseImage) {
        let key = base.base_key();
        let parent = self.stages.iter().rposition(|s| s.alias.as_deref() == Some(key.as_str()));
        let data = parent.map(|i| self.stages[i].data.clone()).unwrap_or_default();
        self.stages.push(Stage { line, alias: base.stage_name(), parent, data });
    }

    /// Payload of the current stage; `None` before the first FROM.
    pub fn current(&self) -> Option<&T> {
        self.stages.last().map(|s| &s.data)
    }

    pub fn current_mut(&mut self) -> Option<&mut T> {
        self.stages.last_mut().map(|s| &mut s.data)
    }

    pub fn last(&self) -> Option<&Stage<T>> {
        self.stages.last()
    }

    pub fn stages(&self) -> &[Stage<T>] {
        &self.stages
    }

    /// Indices of the stages that end up in the final image: the last stage and its
    /// `FROM` ancestors, in definition order.
    pub fn shipping(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        let mut next = self.stages.len().checked_sub(1);
        while let Some(index) = next {
            indices.push(index);
            next = self.stages[index].parent;
        }
        indices.reverse();
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dockerfile::{parse_dockerfile, Instruction};

    fn chain(dockerfile: &str) -> StageChain<Vec<usize>> {
        let mut chain: StageChain<Vec<usize>> = StageChain::default();
        for pos in parse_dockerfile(dockerfile).unwrap() {
            match &pos.instruction {
                Instruction::From(base) => chain.enter(pos.line, base),
                _ => {
                    if let Some(lines) = chain.current_mut() {
                        lines.push(pos.line);
                    }
                }
            }
        }
        chain
    }

    #[test]
    fn test_payload_is_inherited_through_alias() {
        let chain = chain("FROM a AS Base\nRUN x\nFROM other\nRUN y\nFROM base\nRUN z\n");
        assert_eq!(chain.stages()[2].parent, Some(0));
        assert_eq!(chain.current(), Some(&vec![2, 6]));
        assert_eq!(chain.stages()[1].data, vec![4]);
    }

    #[test]
    fn test_shipping_stages() {
        let chain = chain("FROM a AS base\nFROM b AS tools\nFROM base AS app\nFROM app\n");
        assert_eq!(chain.shipping(), vec![0, 2, 3]);
        assert!(StageChain::<()>::default().shipping().is_empty());
    }
}
