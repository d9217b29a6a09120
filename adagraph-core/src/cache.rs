use crate::graphs::store::GraphListener;
use crate::types::*;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Cache key for anomaly queries: statistics depend on every parameter,
/// so a hit requires the full tuple to match.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyKey {
    pub filter: NodeFilter,
    pub method: AnomalyMethod,
    pub threshold: f64,
}

#[derive(Default)]
struct FamilyState {
    dirty: bool,
    affected: HashSet<NodeId>,
    recomputes: u64,
}

#[derive(Default)]
struct CacheState {
    families: HashMap<MetricFamily, FamilyState>,
    degree: Option<Vec<DegreeEntry>>,
    activity: Option<(ColorScheme, Vec<ActivityEntry>)>,
    anomaly: Option<(AnomalyKey, AnomalyReport)>,
    cluster: Option<(ClusterKind, u32, ClusterReport)>,
    flow: Option<(FlowQuery, FlowReport)>,
}

impl CacheState {
    fn family(&mut self, family: MetricFamily) -> &mut FamilyState {
        self.families.entry(family).or_default()
    }
}

/// Per-metric-family dirty tracking on top of the graph store.
///
/// Granularity is deliberately coarse: degree, activity and anomaly
/// metrics depend on whole-group normalization and statistics, and
/// cluster/flow window membership can shift with any block, so a
/// mutation marks every family dirty. The affected-id sets record which
/// nodes were actually touched, for diagnostics and future narrower
/// invalidation.
pub struct MetricsCache {
    state: RwLock<CacheState>,
}

impl MetricsCache {
    pub fn new() -> Self {
        let mut state = CacheState::default();
        for family in MetricFamily::ALL {
            state.family(family).dirty = true;
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// The "recalculate" entry point: force every family dirty and drop
    /// all cached responses regardless of current state.
    pub fn invalidate_all(&self) {
        let mut state = self.state.write();
        for family in MetricFamily::ALL {
            let fam = state.family(family);
            fam.dirty = true;
            fam.affected.clear();
        }
        state.degree = None;
        state.activity = None;
        state.anomaly = None;
        state.cluster = None;
        state.flow = None;
    }

    pub fn is_dirty(&self, family: MetricFamily) -> bool {
        self.state
            .read()
            .families
            .get(&family)
            .map_or(true, |f| f.dirty)
    }

    /// Nodes touched since the family was last recomputed.
    pub fn affected_nodes(&self, family: MetricFamily) -> Vec<NodeId> {
        self.state
            .read()
            .families
            .get(&family)
            .map(|f| f.affected.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// How many times the family's analyzer has actually run. Lets
    /// callers verify cache-hit behavior without instrumenting the
    /// analyzers themselves.
    pub fn recompute_count(&self, family: MetricFamily) -> u64 {
        self.state
            .read()
            .families
            .get(&family)
            .map_or(0, |f| f.recomputes)
    }

    fn mark_recomputed(state: &mut CacheState, family: MetricFamily) {
        let fam = state.family(family);
        fam.dirty = false;
        fam.affected.clear();
        fam.recomputes += 1;
    }

    // ===== DEGREE =====

    pub fn lookup_degree(&self) -> Option<Vec<DegreeEntry>> {
        let state = self.state.read();
        if state.families.get(&MetricFamily::Degree).map_or(true, |f| f.dirty) {
            return None;
        }
        state.degree.clone()
    }

    pub fn store_degree(&self, entries: Vec<DegreeEntry>) {
        let mut state = self.state.write();
        state.degree = Some(entries);
        Self::mark_recomputed(&mut state, MetricFamily::Degree);
    }

    // ===== ACTIVITY =====

    pub fn lookup_activity(&self, scheme: ColorScheme) -> Option<Vec<ActivityEntry>> {
        let state = self.state.read();
        if state.families.get(&MetricFamily::Activity).map_or(true, |f| f.dirty) {
            return None;
        }
        match &state.activity {
            Some((cached_scheme, entries)) if *cached_scheme == scheme => Some(entries.clone()),
            _ => None,
        }
    }

    pub fn store_activity(&self, scheme: ColorScheme, entries: Vec<ActivityEntry>) {
        let mut state = self.state.write();
        state.activity = Some((scheme, entries));
        Self::mark_recomputed(&mut state, MetricFamily::Activity);
    }

    // ===== ANOMALY =====

    pub fn lookup_anomaly(&self, key: &AnomalyKey) -> Option<AnomalyReport> {
        let state = self.state.read();
        if state.families.get(&MetricFamily::Anomaly).map_or(true, |f| f.dirty) {
            return None;
        }
        match &state.anomaly {
            Some((cached_key, report)) if cached_key == key => Some(report.clone()),
            _ => None,
        }
    }

    pub fn store_anomaly(&self, key: AnomalyKey, report: AnomalyReport) {
        let mut state = self.state.write();
        state.anomaly = Some((key, report));
        Self::mark_recomputed(&mut state, MetricFamily::Anomaly);
    }

    // ===== CLUSTER =====

    pub fn lookup_cluster(&self, kind: ClusterKind, window: u32) -> Option<ClusterReport> {
        let state = self.state.read();
        if state.families.get(&MetricFamily::Cluster).map_or(true, |f| f.dirty) {
            return None;
        }
        match &state.cluster {
            Some((cached_kind, cached_window, report))
                if *cached_kind == kind && *cached_window == window =>
            {
                Some(report.clone())
            }
            _ => None,
        }
    }

    pub fn store_cluster(&self, kind: ClusterKind, window: u32, report: ClusterReport) {
        let mut state = self.state.write();
        state.cluster = Some((kind, window, report));
        Self::mark_recomputed(&mut state, MetricFamily::Cluster);
    }

    // ===== FLOW =====

    pub fn lookup_flow(&self, query: &FlowQuery) -> Option<FlowReport> {
        let state = self.state.read();
        if state.families.get(&MetricFamily::Flow).map_or(true, |f| f.dirty) {
            return None;
        }
        match &state.flow {
            Some((cached_query, report)) if cached_query == query => Some(report.clone()),
            _ => None,
        }
    }

    pub fn store_flow(&self, query: FlowQuery, report: FlowReport) {
        let mut state = self.state.write();
        state.flow = Some((query, report));
        Self::mark_recomputed(&mut state, MetricFamily::Flow);
    }

    /// Drop the cached flow response without counting a recompute.
    /// Used by recalculate-all, which has no seed to recompute with.
    pub fn clear_flow(&self) {
        self.state.write().flow = None;
    }
}

impl Default for MetricsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphListener for MetricsCache {
    fn on_mutation(&self, changed: &[NodeId], families: &[MetricFamily]) {
        trace!(changed = changed.len(), "graph mutation invalidates metrics");
        let mut state = self.state.write();
        for &family in families {
            let fam = state.family(family);
            fam.dirty = true;
            fam.affected.extend(changed.iter().cloned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> DegreeEntry {
        DegreeEntry {
            node_id: id.into(),
            node_type: NodeKind::Address,
            in_degree: 1,
            out_degree: 2,
            total_degree: 3,
            type_degree: 3,
        }
    }

    #[test]
    fn starts_fully_dirty() {
        let cache = MetricsCache::new();
        for family in MetricFamily::ALL {
            assert!(cache.is_dirty(family));
        }
        assert!(cache.lookup_degree().is_none());
    }

    #[test]
    fn store_clears_dirty_and_mutation_resets_it() {
        let cache = MetricsCache::new();
        cache.store_degree(vec![entry("addr_a")]);
        assert!(!cache.is_dirty(MetricFamily::Degree));
        assert_eq!(cache.lookup_degree().unwrap().len(), 1);

        cache.on_mutation(&["addr_b".to_string()], &MetricFamily::ALL);
        assert!(cache.is_dirty(MetricFamily::Degree));
        assert!(cache.lookup_degree().is_none());
        assert_eq!(cache.affected_nodes(MetricFamily::Degree), vec!["addr_b".to_string()]);
    }

    #[test]
    fn activity_hit_requires_matching_scheme() {
        let cache = MetricsCache::new();
        cache.store_activity(ColorScheme::Heatmap, Vec::new());
        assert!(cache.lookup_activity(ColorScheme::Heatmap).is_some());
        assert!(cache.lookup_activity(ColorScheme::Grayscale).is_none());
    }

    #[test]
    fn invalidate_all_forces_every_family_dirty() {
        let cache = MetricsCache::new();
        cache.store_degree(vec![entry("addr_a")]);
        cache.store_activity(ColorScheme::Heatmap, Vec::new());
        cache.invalidate_all();
        for family in MetricFamily::ALL {
            assert!(cache.is_dirty(family));
        }
        assert!(cache.lookup_degree().is_none());
        assert!(cache.lookup_activity(ColorScheme::Heatmap).is_none());
    }

    #[test]
    fn recompute_counter_tracks_stores() {
        let cache = MetricsCache::new();
        assert_eq!(cache.recompute_count(MetricFamily::Degree), 0);
        cache.store_degree(Vec::new());
        cache.store_degree(Vec::new());
        assert_eq!(cache.recompute_count(MetricFamily::Degree), 2);
    }
}
