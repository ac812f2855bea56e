use clusterscope::matcher::{Classification, MatchError, Matcher, NeighborCache, DEFAULT_THRESHOLD};
use clusterscope::pipeline::compare_set;
use clusterscope::ClusterSet;

fn set(scenario: &str, templates: &[(u64, &str)]) -> ClusterSet {
    ClusterSet::from_templates(scenario, templates.iter().copied()).unwrap()
}

#[test]
fn end_to_end_example_counts_one_new_cluster() {
    let baseline = set("baseline", &[(1, "Interface * up")]);
    let candidate = set("candidate_scenario", &[(1, "Interface * up"), (2, "Routing table updated")]);
    let matcher = Matcher::new(&baseline, DEFAULT_THRESHOLD);
    assert_eq!(matcher.threshold(), 3);
    assert_eq!(matcher.baseline().scenario(), "baseline");

    let results: Vec<_> = matcher.match_set(&candidate).unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].distance, 0);
    assert_eq!(results[0].classification, Classification::Matched);
    assert!(results[1].distance >= 3);
    assert_eq!(results[1].classification, Classification::New);

    let cmp = compare_set(&matcher, &candidate, false).unwrap();
    assert_eq!(cmp.report.scenario, "candidate_scenario");
    assert_eq!(cmp.report.cluster_count, 2);
    assert_eq!(cmp.report.new_cluster_count, 1);
}

#[test]
fn threshold_boundary_is_strict() {
    let baseline = set("base", &[(1, "a b c d e")]);
    // three substitutions vs two substitutions
    let candidate = set("cand", &[(10, "a x y z e"), (11, "a x y d e")]);
    let matcher = Matcher::new(&baseline, 3);
    let results: Vec<_> = matcher.match_set(&candidate).unwrap().map(Result::unwrap).collect();
    assert_eq!(results[0].distance, 3);
    assert_eq!(results[0].classification, Classification::New);
    assert_eq!(results[1].distance, 2);
    assert_eq!(results[1].classification, Classification::Matched);
}

#[test]
fn threshold_is_configurable() {
    let baseline = set("base", &[(1, "a b c d e")]);
    let candidate = set("cand", &[(10, "a x y z e")]);
    let strict = compare_set(&Matcher::new(&baseline, 1), &candidate, false).unwrap();
    let loose = compare_set(&Matcher::new(&baseline, 10), &candidate, false).unwrap();
    assert_eq!(strict.report.new_cluster_count, 1);
    assert_eq!(loose.report.new_cluster_count, 0);
}

#[test]
fn identical_template_matches_for_any_positive_threshold() {
    let baseline = set("base", &[(1, "session <*> closed")]);
    let candidate = set("cand", &[(1, "session <*> closed")]);
    for threshold in 1..5 {
        let r = Matcher::new(&baseline, threshold).match_set(&candidate).unwrap().next().unwrap().unwrap();
        assert_eq!(r.distance, 0);
        assert_eq!(r.classification, Classification::Matched);
    }
}

#[test]
fn nearest_neighbor_ties_go_to_smallest_baseline_id() {
    let baseline = set("base", &[(30, "link A down"), (12, "link B down"), (20, "link C down")]);
    let candidate = set("cand", &[(1, "link D down")]);
    let r = Matcher::new(&baseline, 3).match_set(&candidate).unwrap().next().unwrap().unwrap();
    assert_eq!(r.distance, 1);
    assert_eq!(r.nearest_baseline_cluster_id, 12);
    assert_eq!(r.nearest_baseline_template.to_string(), "['link', 'B', 'down']");
}

#[test]
fn results_follow_candidate_order() {
    let baseline = set("base", &[(1, "a")]);
    let candidate = set("cand", &[(9, "a"), (3, "b"), (5, "c")]);
    let ids: Vec<u64> = Matcher::new(&baseline, 3)
        .match_set(&candidate)
        .unwrap()
        .map(|r| r.unwrap().candidate_cluster_id)
        .collect();
    assert_eq!(ids, vec![9, 3, 5]);
}

#[test]
fn empty_baseline_reports_undefined_neighbor() {
    let baseline = ClusterSet::new("base");
    let candidate = set("cand", &[(4, "anything at all")]);
    let matcher = Matcher::new(&baseline, 3);
    let err = matcher.match_set(&candidate).unwrap().next().unwrap().unwrap_err();
    assert_eq!(
        err,
        MatchError::UndefinedNeighbor { scenario: "cand".into(), cluster_id: 4, baseline: "base".into() }
    );
    assert!(compare_set(&matcher, &candidate, false).is_err());
}

#[test]
fn empty_candidate_yields_zero_counts() {
    let baseline = set("base", &[(1, "a b")]);
    let candidate = ClusterSet::new("cand");
    let cmp = compare_set(&Matcher::new(&baseline, 3), &candidate, false).unwrap();
    assert_eq!(cmp.report.cluster_count, 0);
    assert_eq!(cmp.report.new_cluster_count, 0);
}

#[test]
fn comparing_baseline_with_itself_is_rejected() {
    let baseline = set("base", &[(1, "a b")]);
    let err = Matcher::new(&baseline, 3).match_set(&baseline).err().unwrap();
    assert_eq!(err, MatchError::SelfComparison("base".into()));
}

#[test]
fn matching_is_not_symmetric() {
    let a = set("a", &[(1, "x y z"), (2, "x y z extra tokens here")]);
    let b = set("b", &[(1, "x y z")]);
    let a_vs_b = compare_set(&Matcher::new(&b, 3), &a, false).unwrap();
    let b_vs_a = compare_set(&Matcher::new(&a, 3), &b, false).unwrap();
    assert_eq!(a_vs_b.report.new_cluster_count, 1);
    assert_eq!(b_vs_a.report.new_cluster_count, 0);
}

#[test]
fn new_count_matches_number_of_new_results() {
    let baseline = set("base", &[(1, "peer <*> up"), (2, "peer <*> down"), (3, "route <*> added")]);
    let candidate = set(
        "cand",
        &[(1, "peer <*> up"), (2, "peer <*> flapping"), (3, "kernel panic on cpu <*>"), (4, "bfd session <*> timed out after <*> ms")],
    );
    let matcher = Matcher::new(&baseline, 3);
    let new_results = matcher.match_set(&candidate).unwrap().filter(|r| r.as_ref().unwrap().is_new()).count();
    let cmp = compare_set(&matcher, &candidate, false).unwrap();
    assert_eq!(cmp.report.new_cluster_count, new_results);
    assert!(cmp.report.new_cluster_count <= cmp.report.cluster_count);
    assert_eq!(new_results, 2);
}

#[test]
fn cached_matcher_agrees_with_uncached() {
    let baseline = set("base", &[(1, "peer <*> up"), (2, "peer <*> down"), (3, "route <*> added to table <*>")]);
    let first = set("first", &[(1, "peer <*> up"), (2, "route <*> removed from table <*>")]);
    let second = set("second", &[(7, "route <*> removed from table <*>"), (8, "peer <*> up"), (9, "ntp sync lost")]);
    let cache = NeighborCache::new(&baseline, 16).unwrap();
    let cached = Matcher::new(&baseline, 3).with_cache(&cache);
    let plain = Matcher::new(&baseline, 3);

    for cand in [&first, &second] {
        let a: Vec<_> = cached.match_set(cand).unwrap().map(Result::unwrap).collect();
        let b: Vec<_> = plain.match_set(cand).unwrap().map(Result::unwrap).collect();
        assert_eq!(a, b);
    }
    assert_eq!(cache.len(), 3);
}

#[test]
fn trace_records_every_cluster() {
    let baseline = set("base", &[(1, "Interface * up")]);
    let candidate = set("cand", &[(1, "Interface * up"), (2, "Routing table updated")]);
    let cmp = compare_set(&Matcher::new(&baseline, 3), &candidate, true).unwrap();
    let trace = cmp.trace.unwrap();
    assert!(trace.starts_with("Comparing with scenario -> cand\n"));
    assert!(trace.contains("Cluster 1 - Minimum Distance: 0 with Cluster 1\n"));
    assert!(trace.contains("Cluster 2 - Minimum Distance: 3, with Cluster 1, Too different\n"));
    assert!(trace.contains("Text of Cluster 2: ['Routing', 'table', 'updated']\n"));
    assert!(trace.ends_with("New clusters from this scenario: 1\n"));
}
