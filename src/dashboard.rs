//! Selection state plus the fragments derived from it.
//!
//! Every input field and output fragment is a node of a [`DependencyGraph`].
//! Changing a field re-evaluates the nodes downstream of it, in topological
//! order, and nothing else.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::assets::DashboardContext;
use crate::figures::{self, Figure};
use crate::graph::{DependencyGraph, GraphError};
use crate::options::{self, DropdownOption, GameChoice};
use crate::scoreboard::{self, Scoreboard, TeamCard};
use crate::tables::{EventKind, Season};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Team,
    Season,
    ShotType,
    Game,
    Event,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Team,
        Field::Season,
        Field::ShotType,
        Field::Game,
        Field::Event,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::Team => "Team",
            Field::Season => "Season",
            Field::ShotType => "Shot type",
            Field::Game => "Game",
            Field::Event => "Event",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Fragment {
    SeasonOptions,
    GameOptions,
    TeamCard,
    OpponentCard,
    Scoreboard,
    GoalsTrend,
    Heatmap,
    Scatter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Node {
    Field(Field),
    Fragment(Fragment),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("no team named for id {0}")]
    UnknownTeam(u32),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub team: Option<u32>,
    pub season: Option<Season>,
    pub shot_type: Option<String>,
    pub game: Option<GameChoice>,
    pub event: Option<EventKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    Team(Option<u32>),
    Season(Option<Season>),
    ShotType(Option<String>),
    Game(Option<GameChoice>),
    Event(Option<EventKind>),
}

impl FieldChange {
    pub fn field(&self) -> Field {
        match self {
            FieldChange::Team(_) => Field::Team,
            FieldChange::Season(_) => Field::Season,
            FieldChange::ShotType(_) => Field::ShotType,
            FieldChange::Game(_) => Field::Game,
            FieldChange::Event(_) => Field::Event,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FragmentValue {
    SeasonOptions(Vec<DropdownOption<Season>>),
    GameOptions(Vec<DropdownOption<GameChoice>>),
    Card(TeamCard),
    Scoreboard(Scoreboard),
    Figure(Figure),
}

/// Latest output of one fragment. `value == None` renders as blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentState {
    pub value: Option<FragmentValue>,
    pub error: Option<String>,
    pub revision: u64,
}

/// What one field change did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    pub recomputed: Vec<Fragment>,
    pub reselected: Vec<Field>,
    pub errors: Vec<(Fragment, String)>,
}

impl UpdateReport {
    pub fn is_noop(&self) -> bool {
        self.recomputed.is_empty() && self.reselected.is_empty()
    }
}

pub fn dashboard_graph() -> Result<DependencyGraph<Node>, GraphError> {
    use Field as F;
    use Fragment as G;
    let f = Node::Field;
    let g = Node::Fragment;

    DependencyGraph::builder()
        .node(f(F::Team), &[])
        .node(f(F::ShotType), &[])
        .node(f(F::Event), &[])
        .node(g(G::SeasonOptions), &[f(F::Team)])
        .node(f(F::Season), &[g(G::SeasonOptions)])
        .node(g(G::GameOptions), &[f(F::Team), f(F::Season)])
        .node(f(F::Game), &[g(G::GameOptions)])
        .node(g(G::TeamCard), &[f(F::Team)])
        .node(g(G::OpponentCard), &[f(F::Team), f(F::Game)])
        .node(g(G::Scoreboard), &[f(F::Game), f(F::Team)])
        .node(g(G::GoalsTrend), &[f(F::Team)])
        .node(g(G::Heatmap), &[f(F::Team), f(F::Season), f(F::Event)])
        .node(
            g(G::Scatter),
            &[f(F::Season), f(F::Team), f(F::ShotType), f(F::Game)],
        )
        .build()
}

pub struct Dashboard {
    ctx: Arc<DashboardContext>,
    graph: DependencyGraph<Node>,
    selection: Selection,
    fragments: BTreeMap<Fragment, FragmentState>,
    team_options: Vec<DropdownOption<u32>>,
    type_options: Vec<DropdownOption<String>>,
    event_options: Vec<DropdownOption<EventKind>>,
}

impl Dashboard {
    /// Builds the graph and evaluates every fragment once for `initial`.
    pub fn new(ctx: Arc<DashboardContext>, initial: Selection) -> Result<Self, GraphError> {
        let graph = dashboard_graph()?;
        let team_options = options::team_options(&ctx.tables);
        let type_options = options::type_options(&ctx.tables);
        let event_options = options::event_options(&ctx.tables);
        let mut dashboard = Self {
            ctx,
            graph,
            selection: initial,
            fragments: BTreeMap::new(),
            team_options,
            type_options,
            event_options,
        };
        let all: Vec<Node> = dashboard.graph.topo_order().to_vec();
        let roots: BTreeSet<Node> = all.iter().copied().collect();
        dashboard.evaluate(&all, roots);
        Ok(dashboard)
    }

    pub fn context(&self) -> &DashboardContext {
        &self.ctx
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn fragment(&self, fragment: Fragment) -> Option<&FragmentState> {
        self.fragments.get(&fragment)
    }

    pub fn team_options(&self) -> &[DropdownOption<u32>] {
        &self.team_options
    }

    pub fn type_options(&self) -> &[DropdownOption<String>] {
        &self.type_options
    }

    pub fn event_options(&self) -> &[DropdownOption<EventKind>] {
        &self.event_options
    }

    pub fn season_options(&self) -> &[DropdownOption<Season>] {
        match self.value(Fragment::SeasonOptions) {
            Some(FragmentValue::SeasonOptions(opts)) => opts,
            _ => &[],
        }
    }

    pub fn game_options(&self) -> &[DropdownOption<GameChoice>] {
        match self.value(Fragment::GameOptions) {
            Some(FragmentValue::GameOptions(opts)) => opts,
            _ => &[],
        }
    }

    pub fn figure(&self, fragment: Fragment) -> Option<&Figure> {
        match self.value(fragment) {
            Some(FragmentValue::Figure(fig)) => Some(fig),
            _ => None,
        }
    }

    pub fn card(&self, fragment: Fragment) -> Option<&TeamCard> {
        match self.value(fragment) {
            Some(FragmentValue::Card(card)) => Some(card),
            _ => None,
        }
    }

    pub fn scoreboard(&self) -> Option<&Scoreboard> {
        match self.value(Fragment::Scoreboard) {
            Some(FragmentValue::Scoreboard(board)) => Some(board),
            _ => None,
        }
    }

    fn value(&self, fragment: Fragment) -> Option<&FragmentValue> {
        self.fragments.get(&fragment)?.value.as_ref()
    }

    /// Applies one field change and re-evaluates its downstream closure.
    pub fn apply(&mut self, change: FieldChange) -> UpdateReport {
        let field = change.field();
        if !self.set_field(change) {
            return UpdateReport::default();
        }
        let affected = self.graph.affected(Node::Field(field));
        self.evaluate(&affected, BTreeSet::from([Node::Field(field)]))
    }

    /// Moves the given selector `step` positions through its option list.
    pub fn cycle(&mut self, field: Field, step: isize) -> UpdateReport {
        let change = match field {
            Field::Team => {
                let values: Vec<_> = self.team_options.iter().map(|o| o.value).collect();
                step_value(&values, self.selection.team, step).map(|v| FieldChange::Team(Some(v)))
            }
            Field::Season => {
                let values: Vec<_> = self.season_options().iter().map(|o| o.value).collect();
                step_value(&values, self.selection.season, step)
                    .map(|v| FieldChange::Season(Some(v)))
            }
            Field::ShotType => {
                let values: Vec<_> = self.type_options.iter().map(|o| o.value.clone()).collect();
                step_value(&values, self.selection.shot_type.clone(), step)
                    .map(|v| FieldChange::ShotType(Some(v)))
            }
            Field::Game => {
                let values: Vec<_> = self.game_options().iter().map(|o| o.value).collect();
                step_value(&values, self.selection.game, step).map(|v| FieldChange::Game(Some(v)))
            }
            Field::Event => {
                let values: Vec<_> = self.event_options.iter().map(|o| o.value).collect();
                step_value(&values, self.selection.event, step)
                    .map(|v| FieldChange::Event(Some(v)))
            }
        };
        match change {
            Some(change) => self.apply(change),
            None => UpdateReport::default(),
        }
    }

    fn set_field(&mut self, change: FieldChange) -> bool {
        let sel = &mut self.selection;
        match change {
            FieldChange::Team(v) => replace_if_changed(&mut sel.team, v),
            FieldChange::Season(v) => replace_if_changed(&mut sel.season, v),
            FieldChange::ShotType(v) => replace_if_changed(&mut sel.shot_type, v),
            FieldChange::Game(v) => replace_if_changed(&mut sel.game, v),
            FieldChange::Event(v) => replace_if_changed(&mut sel.event, v),
        }
    }

    // A node runs only when one of its inputs actually changed during this pass.
    fn evaluate(&mut self, nodes: &[Node], mut dirty: BTreeSet<Node>) -> UpdateReport {
        let mut report = UpdateReport::default();
        for node in nodes {
            let stale = dirty.contains(node)
                || self.graph.deps(*node).iter().any(|dep| dirty.contains(dep));
            if !stale {
                continue;
            }
            match *node {
                Node::Field(field) => {
                    if self.reconcile(field) {
                        report.reselected.push(field);
                        dirty.insert(*node);
                    }
                }
                Node::Fragment(fragment) => {
                    self.recompute(fragment, &mut report);
                    dirty.insert(*node);
                }
            }
        }
        debug!(
            recomputed = report.recomputed.len(),
            reselected = report.reselected.len(),
            "dashboard pass complete"
        );
        report
    }

    fn recompute(&mut self, fragment: Fragment, report: &mut UpdateReport) {
        let snapshot = self.selection.clone();
        let result = compute_fragment(&self.ctx, &snapshot, fragment);
        let state = self.fragments.entry(fragment).or_default();
        state.revision += 1;
        match result {
            Ok(value) => {
                state.value = value;
                state.error = None;
            }
            Err(err) => {
                warn!(?fragment, "fragment degraded to blank: {err}");
                let msg = err.to_string();
                state.value = None;
                state.error = Some(msg.clone());
                report.errors.push((fragment, msg));
            }
        }
        report.recomputed.push(fragment);
    }

    /// Re-selects a constrained field when its option list no longer holds it.
    fn reconcile(&mut self, field: Field) -> bool {
        match field {
            Field::Season => {
                let opts = self.season_options();
                let current = self.selection.season;
                if current.is_some_and(|s| opts.iter().any(|o| o.value == s)) {
                    return false;
                }
                let next = opts.last().map(|o| o.value);
                replace_if_changed(&mut self.selection.season, next)
            }
            Field::Game => {
                let opts = self.game_options();
                let current = self.selection.game;
                if current.is_some_and(|g| opts.iter().any(|o| o.value == g)) {
                    return false;
                }
                replace_if_changed(&mut self.selection.game, Some(GameChoice::All))
            }
            Field::Team | Field::ShotType | Field::Event => false,
        }
    }
}

/// Pure evaluation of one fragment against a selection snapshot.
pub fn compute_fragment(
    ctx: &DashboardContext,
    sel: &Selection,
    fragment: Fragment,
) -> Result<Option<FragmentValue>, LookupError> {
    let tables = &ctx.tables;
    let value = match fragment {
        Fragment::SeasonOptions => sel
            .team
            .map(|team| FragmentValue::SeasonOptions(options::season_options(tables, team))),
        Fragment::GameOptions => match (sel.team, sel.season) {
            (Some(team), Some(season)) => Some(FragmentValue::GameOptions(
                options::game_options(tables, team, season),
            )),
            _ => Some(FragmentValue::GameOptions(vec![DropdownOption::new(
                options::ALL_GAMES_LABEL,
                GameChoice::All,
            )])),
        },
        Fragment::TeamCard => match sel.team {
            Some(team) if tables.teams.contains(team) => {
                Some(FragmentValue::Card(scoreboard::team_card(ctx, team)))
            }
            Some(team) => return Err(LookupError::UnknownTeam(team)),
            None => None,
        },
        Fragment::OpponentCard => match (sel.team, single_game(sel)) {
            (Some(team), Some(game)) => match scoreboard::opponent_card(ctx, game, team) {
                Some(card) if tables.teams.contains(card.team_id) => Some(FragmentValue::Card(card)),
                Some(card) => return Err(LookupError::UnknownTeam(card.team_id)),
                None => None,
            },
            _ => None,
        },
        Fragment::Scoreboard => match (sel.team, single_game(sel)) {
            (Some(team), Some(game)) => Some(FragmentValue::Scoreboard(
                scoreboard::compute_scoreboard(tables, game, team),
            )),
            _ => None,
        },
        Fragment::GoalsTrend => sel
            .team
            .map(|team| FragmentValue::Figure(figures::team_goals_trend(ctx, team))),
        Fragment::Heatmap => match (sel.team, sel.season, sel.event) {
            (Some(team), Some(season), Some(event)) => Some(FragmentValue::Figure(
                figures::shot_density_heatmap(ctx, season, team, event),
            )),
            _ => None,
        },
        Fragment::Scatter => match (sel.team, sel.season, sel.shot_type.as_deref()) {
            (Some(team), Some(season), Some(shot_type)) => Some(FragmentValue::Figure(
                figures::shot_scatter(ctx, season, team, shot_type, single_game(sel)),
            )),
            _ => None,
        },
    };
    Ok(value)
}

fn single_game(sel: &Selection) -> Option<u64> {
    sel.game.and_then(GameChoice::game_id)
}

fn replace_if_changed<T: PartialEq>(slot: &mut Option<T>, value: Option<T>) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn step_value<T: PartialEq + Clone>(values: &[T], current: Option<T>, step: isize) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    let len = values.len() as isize;
    let pos = current
        .and_then(|c| values.iter().position(|v| *v == c))
        .map(|p| p as isize);
    let next = match pos {
        Some(p) => (p + step).rem_euclid(len),
        None if step < 0 => len - 1,
        None => 0,
    };
    values.get(next as usize).cloned()
}
