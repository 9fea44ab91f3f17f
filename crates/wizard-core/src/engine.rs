//! The wizard execution engine.
//!
//! [`WizardEngine`] walks a parsed script with an explicit frame stack, so a
//! run can stop at any `Select*` statement and continue later without
//! holding a thread or a borrowed stack. The host drives it:
//!
//! 1. [`start`](WizardEngine::start) runs until the first page, a requirement
//!    prompt, or a terminal state.
//! 2. [`resume`](WizardEngine::resume) answers a page with option indices.
//! 3. [`override_requirements`](WizardEngine::override_requirements) answers
//!    a requirement prompt (only with [`OverridePolicy::Ask`]).
//! 4. [`back`](WizardEngine::back) rewinds to the previous page, restoring
//!    the flags and plan as they were when that page was shown.
//! 5. [`cancel`](WizardEngine::cancel) aborts at any non-terminal point.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use wizard_core::engine::{Step, WizardEngine};
//! use wizard_core::host::HostProfile;
//!
//! let script = r#"
//! SelectOne "Texture size", "|2K", "", "", "4K", "", ""
//!     Case "2K"
//!         SelectSubPackage "10 Textures 2K"
//!     Case "4K"
//!         SelectSubPackage "10 Textures 4K"
//! EndSelect
//! "#;
//!
//! let mut engine = WizardEngine::new(Arc::new(HostProfile::default()));
//! let step = engine.start(script).unwrap();
//! assert!(matches!(step, Step::AwaitingSelection(_)));
//!
//! match engine.resume(&[1]).unwrap() {
//!     Step::Completed(plan) => assert_eq!(plan.subpackages(), &["10 Textures 4K"]),
//!     other => panic!("unexpected step: {:?}", other),
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Span};
use uuid::Uuid;

use crate::ast::{
    AssignOp, BinOp, Block, Directive, Expression, Script, Select, Statement, StatementKind,
};
use crate::error::{ContractViolation, RuntimeError, WizardError};
use crate::eval::{apply_binary, evaluate, evaluate_condition, evaluate_text, FlagTable};
use crate::host::{Component, HostFacts};
use crate::page::{Page, PageOption};
use crate::parser::parse;
use crate::plan::{IniTweak, InstallationPlan, PlanBuilder};
use crate::requirements::{self, RequirementResult, RequirementSpec};

/// What to do when a `RequireVersions` check fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverridePolicy {
    /// Fail the run.
    #[default]
    Deny,
    /// Continue regardless, logging a warning.
    Allow,
    /// Continue only if every failed component is listed.
    AllowFor(Vec<Component>),
    /// Suspend and let the host decide via `override_requirements`.
    Ask,
}

/// The engine's lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineState {
    NotStarted,
    Running,
    AwaitingSelection(Page),
    AwaitingOverride(Vec<RequirementResult>),
    Completed(InstallationPlan),
    Failed(WizardError),
    /// `Cancel`, `Return` or a host cancel. Carries the script's reason, if any.
    Cancelled(Option<String>),
}

impl EngineState {
    pub fn name(&self) -> &'static str {
        match self {
            EngineState::NotStarted => "not started",
            EngineState::Running => "running",
            EngineState::AwaitingSelection(_) => "awaiting selection",
            EngineState::AwaitingOverride(_) => "awaiting override",
            EngineState::Completed(_) => "completed",
            EngineState::Failed(_) => "failed",
            EngineState::Cancelled(_) => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineState::Completed(_) | EngineState::Failed(_) | EngineState::Cancelled(_)
        )
    }
}

/// Where a drive call stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    AwaitingSelection(Page),
    AwaitingOverride(Vec<RequirementResult>),
    Completed(InstallationPlan),
    Failed(WizardError),
    Cancelled(Option<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Frame {
    block: Block,
    pc: usize,
}

/// Everything needed to show a page again, taken when it is answered.
#[derive(Debug, Clone)]
struct Checkpoint {
    frames: Vec<Frame>,
    flags: FlagTable,
    plan: Option<PlanBuilder>,
    select: Arc<Select>,
    page: Page,
    requirement_count: usize,
    chosen: Vec<usize>,
}

enum Flow {
    Continue,
    /// The state was set to a suspended or terminal state.
    Stop,
}

/// Runs one wizard script against one host.
pub struct WizardEngine {
    run_id: Uuid,
    span: Span,
    host: Arc<dyn HostFacts>,
    policy: OverridePolicy,
    state: EngineState,
    script: Option<Arc<Script>>,
    frames: Vec<Frame>,
    flags: FlagTable,
    plan: Option<PlanBuilder>,
    pending_select: Option<Arc<Select>>,
    requirement_results: Vec<RequirementResult>,
    history: Vec<Checkpoint>,
    /// Labels last chosen on each page, keyed by the page's source line.
    remembered: BTreeMap<usize, Vec<String>>,
}

impl WizardEngine {
    pub fn new(host: Arc<dyn HostFacts>) -> Self {
        let run_id = Uuid::new_v4();
        Self {
            run_id,
            span: info_span!("wizard_run", %run_id),
            host,
            policy: OverridePolicy::default(),
            state: EngineState::NotStarted,
            script: None,
            frames: Vec::new(),
            flags: FlagTable::new(),
            plan: None,
            pending_select: None,
            requirement_results: Vec::new(),
            history: Vec::new(),
            remembered: BTreeMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: OverridePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn policy(&self) -> &OverridePolicy {
        &self.policy
    }

    pub fn flags(&self) -> &FlagTable {
        &self.flags
    }

    pub fn script(&self) -> Option<&Script> {
        self.script.as_deref()
    }

    /// Results of every `RequireVersions` executed so far, in execution order.
    pub fn requirement_results(&self) -> &[RequirementResult] {
        &self.requirement_results
    }

    /// Whether [`back`](Self::back) would succeed.
    pub fn can_go_back(&self) -> bool {
        !self.history.is_empty()
            && matches!(
                self.state,
                EngineState::AwaitingSelection(_) | EngineState::AwaitingOverride(_)
            )
    }

    /// Each answered page on the current path as its description and chosen labels.
    pub fn selected_options(&self) -> Vec<(String, Vec<String>)> {
        self.history
            .iter()
            .map(|c| (c.page.description.clone(), labels_of(&c.page, &c.chosen)))
            .collect()
    }

    /// The page awaiting an answer, if any.
    pub fn current_page(&self) -> Option<&Page> {
        match &self.state {
            EngineState::AwaitingSelection(page) => Some(page),
            _ => None,
        }
    }

    /// Parses `source` and runs it until the first suspension or terminal state.
    ///
    /// A syntax error does not produce an `Err`: the engine moves to
    /// `Failed` and the error is reported through the returned [`Step`].
    pub fn start(&mut self, source: &str) -> Result<Step, WizardError> {
        self.ensure_not_started()?;
        let span = self.span.clone();
        let _guard = span.enter();
        match parse(source) {
            Ok(script) => self.begin(script),
            Err(e) => {
                warn!(
                    line = e.line,
                    column = e.column,
                    error = %e.message,
                    "script failed to parse"
                );
                Ok(self.fail(e.into()))
            }
        }
    }

    /// Runs an already parsed script.
    pub fn start_script(&mut self, script: Script) -> Result<Step, WizardError> {
        self.ensure_not_started()?;
        let span = self.span.clone();
        let _guard = span.enter();
        self.begin(script)
    }

    /// Answers the pending page with the chosen option indices.
    ///
    /// An invalid selection returns `Err` and leaves the page pending.
    pub fn resume(&mut self, indices: &[usize]) -> Result<Step, WizardError> {
        let span = self.span.clone();
        let _guard = span.enter();

        let page = match &self.state {
            EngineState::AwaitingSelection(page) => page.clone(),
            other => return Err(self.contract_error(other, false).into()),
        };
        let chosen = page
            .validate(indices)
            .map_err(|e| WizardError::from(e.at_line(page.line)))?;
        let Some(select) = self.pending_select.take() else {
            return Err(ContractViolation::NotAwaitingSelection {
                state: self.state.name().to_string(),
            }
            .into());
        };
        debug!(line = page.line, ?chosen, "selection accepted");

        self.remembered.insert(page.line, labels_of(&page, &chosen));
        self.history.push(Checkpoint {
            frames: self.frames.clone(),
            flags: self.flags.clone(),
            plan: self.plan.clone(),
            select: Arc::clone(&select),
            page,
            requirement_count: self.requirement_results.len(),
            chosen: chosen.clone(),
        });

        let bodies: Vec<Block> = chosen
            .iter()
            .filter_map(|&i| select.options.get(i).and_then(|o| o.body.clone()))
            .collect();
        if bodies.is_empty() {
            if let Some(block) = &select.default_block {
                self.push_block(block.clone());
            }
        } else {
            // Reverse so the first chosen option runs first
            for block in bodies.into_iter().rev() {
                self.push_block(block);
            }
        }

        self.state = EngineState::Running;
        Ok(self.run())
    }

    /// Answers a requirement prompt raised under [`OverridePolicy::Ask`].
    pub fn override_requirements(&mut self, install_anyway: bool) -> Result<Step, WizardError> {
        let span = self.span.clone();
        let _guard = span.enter();

        let results = match &self.state {
            EngineState::AwaitingOverride(results) => results.clone(),
            other => return Err(self.contract_error(other, true).into()),
        };
        if install_anyway {
            warn!(failed = failed_components(&results).len(), "requirements overridden by host");
            self.state = EngineState::Running;
            Ok(self.run())
        } else {
            Ok(self.fail(WizardError::RequirementNotMet { results }))
        }
    }

    /// Returns to the most recently answered page.
    ///
    /// Flags, plan operations and requirement results recorded after that page
    /// are undone. The restored page carries the earlier answer in
    /// [`Page::previous_selection`]. Allowed while a page or a requirement
    /// prompt is pending.
    pub fn back(&mut self) -> Result<Step, WizardError> {
        let span = self.span.clone();
        let _guard = span.enter();

        match &self.state {
            EngineState::AwaitingSelection(_) | EngineState::AwaitingOverride(_) => {}
            other => return Err(self.contract_error(other, false).into()),
        }
        let Some(checkpoint) = self.history.pop() else {
            return Err(ContractViolation::NoPreviousPage.into());
        };
        debug!(line = checkpoint.page.line, "returning to previous page");

        self.frames = checkpoint.frames;
        self.flags = checkpoint.flags;
        self.plan = checkpoint.plan;
        self.pending_select = Some(checkpoint.select);
        self.requirement_results.truncate(checkpoint.requirement_count);
        let mut page = checkpoint.page;
        page.previous_selection = Some(checkpoint.chosen);
        self.state = EngineState::AwaitingSelection(page);
        Ok(self.step())
    }

    /// Cancels the run. The partial plan is discarded.
    pub fn cancel(&mut self) -> Result<Step, WizardError> {
        let span = self.span.clone();
        let _guard = span.enter();

        match &self.state {
            EngineState::NotStarted => return Err(ContractViolation::NotStarted.into()),
            s if s.is_terminal() => {
                return Err(ContractViolation::Terminal {
                    state: s.name().to_string(),
                }
                .into())
            }
            _ => {}
        }
        info!("run cancelled by host");
        Ok(self.finish_cancelled(None))
    }

    fn ensure_not_started(&self) -> Result<(), ContractViolation> {
        match &self.state {
            EngineState::NotStarted => Ok(()),
            s if s.is_terminal() => Err(ContractViolation::Terminal {
                state: s.name().to_string(),
            }),
            _ => Err(ContractViolation::AlreadyStarted),
        }
    }

    fn contract_error(&self, state: &EngineState, want_override: bool) -> ContractViolation {
        let name = state.name().to_string();
        match state {
            EngineState::NotStarted => ContractViolation::NotStarted,
            s if s.is_terminal() => ContractViolation::Terminal { state: name },
            _ if want_override => ContractViolation::NotAwaitingOverride { state: name },
            _ => ContractViolation::NotAwaitingSelection { state: name },
        }
    }

    fn begin(&mut self, script: Script) -> Result<Step, WizardError> {
        info!(
            statements = script.statements.len(),
            requirements = script.requirements.len(),
            "wizard run started"
        );
        self.push_block(script.statements.clone());
        self.script = Some(Arc::new(script));
        self.plan = Some(PlanBuilder::new());
        self.state = EngineState::Running;
        Ok(self.run())
    }

    fn push_block(&mut self, block: Block) {
        if !block.is_empty() {
            self.frames.push(Frame { block, pc: 0 });
        }
    }

    fn run(&mut self) -> Step {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return self.complete();
            };
            if frame.pc >= frame.block.len() {
                self.frames.pop();
                continue;
            }
            let block = Arc::clone(&frame.block);
            let pc = frame.pc;
            frame.pc += 1;

            let statement = &block[pc];
            match self.execute(statement) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => return self.step(),
                Err(e) => return self.fail(e),
            }
        }
    }

    fn execute(&mut self, statement: &Statement) -> Result<Flow, WizardError> {
        let line = statement.line;
        let at_line = |e: RuntimeError| WizardError::from(e.at_line(line));

        match &statement.kind {
            StatementKind::Assign { variable, op, value } => {
                let value = evaluate(value, &self.flags, self.host.as_ref()).map_err(at_line)?;
                let value = match op {
                    AssignOp::Set => value,
                    AssignOp::Add | AssignOp::Sub => {
                        let current = self
                            .flags
                            .get(variable)
                            .cloned()
                            .ok_or_else(|| at_line(RuntimeError::undefined_variable(variable)))?;
                        let bin = if *op == AssignOp::Add { BinOp::Add } else { BinOp::Sub };
                        apply_binary(bin, current, value).map_err(at_line)?
                    }
                };
                debug!(line, variable = variable.as_str(), %value, "assign");
                self.flags.set(variable, value);
                Ok(Flow::Continue)
            }
            StatementKind::If { branches, else_block } => {
                for branch in branches {
                    if evaluate_condition(&branch.condition, &self.flags, self.host.as_ref())
                        .map_err(at_line)?
                    {
                        debug!(line, "branch taken");
                        self.push_block(branch.body.clone());
                        return Ok(Flow::Continue);
                    }
                }
                if let Some(block) = else_block {
                    debug!(line, "else taken");
                    self.push_block(block.clone());
                }
                Ok(Flow::Continue)
            }
            StatementKind::Select(select) => {
                let page = self.build_page(select, line).map_err(at_line)?;
                debug!(line, options = page.options.len(), mode = ?page.mode, "awaiting selection");
                self.pending_select = Some(Arc::clone(select));
                self.state = EngineState::AwaitingSelection(page);
                Ok(Flow::Stop)
            }
            StatementKind::RequireVersions(specs) => self.check_requirements(specs, line),
            StatementKind::Directive(directive) => {
                self.apply_directive(directive, line).map_err(at_line)?;
                Ok(Flow::Continue)
            }
            StatementKind::Cancel(reason) => {
                let reason = match reason {
                    Some(expr) => {
                        Some(evaluate_text(expr, &self.flags, self.host.as_ref()).map_err(at_line)?)
                    }
                    None => None,
                };
                info!(line, reason = reason.as_deref().unwrap_or(""), "script cancelled");
                self.finish_cancelled(reason);
                Ok(Flow::Stop)
            }
            StatementKind::Return => {
                info!(line, "script returned");
                self.finish_cancelled(None);
                Ok(Flow::Stop)
            }
        }
    }

    fn build_page(&self, select: &Select, line: usize) -> Result<Page, RuntimeError> {
        let host = self.host.as_ref();
        let description = evaluate_text(&select.description, &self.flags, host)?;
        let options = select
            .options
            .iter()
            .map(|o| {
                Ok(PageOption {
                    label: o.label.clone(),
                    description: evaluate_text(&o.description, &self.flags, host)?,
                    image: o.image.clone(),
                    is_default: o.is_default,
                })
            })
            .collect::<Result<Vec<PageOption>, RuntimeError>>()?;
        let previous_selection = self.remembered.get(&line).map(|labels| {
            options
                .iter()
                .enumerate()
                .filter(|(_, o)| labels.contains(&o.label))
                .map(|(i, _)| i)
                .collect()
        });
        Ok(Page {
            description,
            options,
            mode: select.mode,
            allows_empty: select.mode.allows_empty(),
            line,
            previous_selection,
        })
    }

    fn check_requirements(
        &mut self,
        specs: &[RequirementSpec],
        line: usize,
    ) -> Result<Flow, WizardError> {
        let results = requirements::check(specs, self.host.as_ref());
        self.requirement_results.extend(results.iter().cloned());
        if requirements::all_passed(&results) {
            return Ok(Flow::Continue);
        }

        let failed = failed_components(&results);
        let allowed = match &self.policy {
            OverridePolicy::Deny => false,
            OverridePolicy::Allow => true,
            OverridePolicy::AllowFor(list) => failed.iter().all(|c| list.contains(c)),
            OverridePolicy::Ask => {
                debug!(line, failed = failed.len(), "awaiting requirement override");
                self.state = EngineState::AwaitingOverride(results);
                return Ok(Flow::Stop);
            }
        };
        if allowed {
            for result in results.iter().filter(|r| !r.passed) {
                warn!(line, requirement = %result, "requirement not met, continuing by policy");
            }
            Ok(Flow::Continue)
        } else {
            Err(WizardError::RequirementNotMet { results })
        }
    }

    fn apply_directive(&mut self, directive: &Directive, line: usize) -> Result<(), RuntimeError> {
        let host = self.host.as_ref();
        let flags = &self.flags;
        let text = |expr: &Expression| evaluate_text(expr, flags, host);
        let Some(plan) = self.plan.as_mut() else {
            return Ok(());
        };

        match directive {
            Directive::SelectSubPackage(name) => plan.select_subpackage(text(name)?),
            Directive::DeSelectSubPackage(name) => plan.deselect_subpackage(text(name)?),
            Directive::SelectAll => {
                for name in host.subpackages() {
                    plan.select_subpackage(name);
                }
            }
            Directive::DeSelectAll => plan.deselect_all(),
            Directive::SelectPlugin(name) => plan.select_plugin(text(name)?),
            Directive::DeSelectPlugin(name) => plan.deselect_plugin(text(name)?),
            Directive::RenamePlugin { from, to } => plan.rename_plugin(text(from)?, text(to)?),
            Directive::EditIni { file, section, key, value } => plan.edit_ini(IniTweak {
                file: text(file)?,
                section: text(section)?,
                key: text(key)?,
                value: text(value)?,
            }),
            Directive::Note(note) => plan.note(text(note)?),
        }
        debug!(line, directive = directive.name(), "directive applied");
        Ok(())
    }

    fn complete(&mut self) -> Step {
        let plan = self.plan.take().unwrap_or_default().finalize();
        info!(
            subpackages = plan.subpackages().len(),
            plugins = plan.plugins().len(),
            "wizard run completed"
        );
        self.state = EngineState::Completed(plan);
        self.step()
    }

    fn fail(&mut self, error: WizardError) -> Step {
        warn!(error = %error, "wizard run failed");
        self.history.clear();
        self.frames.clear();
        self.plan = None;
        self.pending_select = None;
        self.state = EngineState::Failed(error);
        self.step()
    }

    fn finish_cancelled(&mut self, reason: Option<String>) -> Step {
        self.history.clear();
        self.frames.clear();
        self.plan = None;
        self.pending_select = None;
        self.state = EngineState::Cancelled(reason);
        self.step()
    }

    fn step(&self) -> Step {
        match &self.state {
            EngineState::AwaitingSelection(page) => Step::AwaitingSelection(page.clone()),
            EngineState::AwaitingOverride(results) => Step::AwaitingOverride(results.clone()),
            EngineState::Completed(plan) => Step::Completed(plan.clone()),
            EngineState::Failed(error) => Step::Failed(error.clone()),
            EngineState::Cancelled(reason) => Step::Cancelled(reason.clone()),
            // run() only returns after setting one of the states above
            EngineState::NotStarted | EngineState::Running => {
                Step::Failed(WizardError::Contract(ContractViolation::NotStarted))
            }
        }
    }
}

fn labels_of(page: &Page, indices: &[usize]) -> Vec<String> {
    indices
        .iter()
        .filter_map(|&i| page.options.get(i))
        .map(|o| o.label.clone())
        .collect()
}

fn failed_components(results: &[RequirementResult]) -> Vec<Component> {
    results.iter().filter(|r| !r.passed).map(|r| r.component).collect()
}
