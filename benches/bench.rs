// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Benchmarks for the pattern query paths.
 */

use std::io::Write;

use criterion::*;

use antpat::*;

fn beam_params() -> GainParams {
    GainParams {
        ref_gain: 25.0,
        hbw: 3.0_f64.to_radians(),
        vbw: 5.0_f64.to_radians(),
        azim: 2.0_f64.to_radians(),
        elev: 1.0_f64.to_radians(),
        ..Default::default()
    }
}

fn table_pattern() -> tabulated::TablePattern {
    let mut pat = tabulated::TablePattern::default();
    for deg in -180..=180 {
        let a = f64::from(deg).to_radians();
        pat.set_azim_sample(a, -(f64::from(deg) / 20.0).powi(2));
    }
    for deg in -90..=90 {
        let e = f64::from(deg).to_radians();
        pat.set_elev_sample(e, -(f64::from(deg) / 10.0).powi(2));
    }
    pat.set_valid(true);
    pat
}

fn analytic(c: &mut Criterion) {
    c.bench_function("gauss gain", |b| {
        let gauss = AnalyticPattern::new_gauss();
        let params = beam_params();
        b.iter(|| {
            black_box(gauss.gain(&params));
        })
    });

    c.bench_function("sinxx gain", |b| {
        let sinxx = AnalyticPattern::new_sin_xx();
        let params = beam_params();
        b.iter(|| {
            black_box(sinxx.gain(&params));
        })
    });
}

fn table(c: &mut Criterion) {
    c.bench_function("table gain", |b| {
        let pat = table_pattern();
        let params = beam_params();
        b.iter(|| {
            black_box(pat.gain(&params));
        })
    });

    c.bench_function("table min_max_gain (cached)", |b| {
        let pat = table_pattern();
        let params = beam_params();
        // Prime the cache.
        pat.min_max_gain(&params);
        b.iter(|| {
            black_box(pat.min_max_gain(&params));
        })
    });

    c.bench_function("gains batch", |b| {
        let pattern = AntennaPattern::from(table_pattern());
        let queries: Vec<GainParams> = (-180..180)
            .map(|deg| GainParams {
                azim: f64::from(deg).to_radians(),
                ..beam_params()
            })
            .collect();
        let mut results = vec![0.0; queries.len()];
        b.iter(|| {
            pattern.gains_inner(&queries, &mut results);
            black_box(&results);
        })
    });
}

fn loading(c: &mut Criterion) {
    c.bench_function("load .pat", |b| {
        let path = std::env::temp_dir().join(format!("antpat-bench-{}.pat", std::process::id()));
        let mut text = String::from("1 2\n361\n");
        for deg in -180..=180 {
            text.push_str(&format!("{deg} {:.4}\n", -(f64::from(deg) / 20.0).powi(2)));
        }
        text.push_str("181\n");
        for deg in -90..=90 {
            text.push_str(&format!("{deg} {:.4}\n", -(f64::from(deg) / 10.0).powi(2)));
        }
        std::fs::File::create(&path)
            .unwrap()
            .write_all(text.as_bytes())
            .unwrap();
        b.iter(|| {
            black_box(load_pattern_file(&path, 0.0).unwrap());
        });
        std::fs::remove_file(&path).ok();
    });
}

criterion_group!(benches, analytic, table, loading);
criterion_main!(benches);
