//! # 節慶禮盒生產計劃範例
//!
//! 這個範例展示完整的流程：
//! - 配方：薑餅、松露巧克力
//! - 組合：餅乾罐（薑餅 + 罐子）、禮籃（兩個餅乾罐 + 松露 + 緞帶）
//! - 計劃 → 收貨 → 生產 → 組裝 → 進度 → 過期判斷

use chrono::{Duration, Utc};
use prodplan::*;
use prodplan_core::{ItemConversion, YieldConfig};
use rust_decimal::Decimal;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("===== 節慶禮盒生產計劃範例 =====\n");

    // ========== 1. 建立目錄 ==========
    println!("[1] 建立配方與組合");
    let mut catalog = MemoryCatalog::new();
    catalog.upsert_recipe(
        Recipe::new("GINGERBREAD", "Gingerbread Cookie")
            .with_yield(Decimal::from(24))
            .with_yield_config(YieldConfig::new("double", Decimal::from(48), Decimal::from(2)))
            .with_ingredient("FLOUR", Decimal::from(3), "cup")
            .with_ingredient("MOLASSES", Decimal::from(120), "ml")
            .with_ingredient("BUTTER", Decimal::from(170), "g"),
    );
    catalog.upsert_recipe(
        Recipe::new("TRUFFLE", "Dark Truffle")
            .with_yield(Decimal::from(30))
            .with_ingredient("CHOCOLATE", Decimal::from(450), "g")
            .with_ingredient("CREAM", Decimal::from(1), "cup"),
    );
    catalog.upsert_bundle(
        Bundle::new("TIN", "Cookie Tin")
            .with_unit("GINGERBREAD", Decimal::from(6))
            .with_packaging("TIN-CAN", Decimal::ONE, "each"),
    );
    catalog.upsert_bundle(
        Bundle::new("HAMPER", "Holiday Hamper")
            .with_sub_bundle("TIN", Decimal::from(2))
            .with_unit("TRUFFLE", Decimal::from(8))
            .with_packaging("RIBBON", Decimal::from(60), "cm"),
    );
    catalog.touch_target("HOLIDAY-ORDER", Utc::now());

    let converter = UnitConverter::new()
        .with_item_conversion(ItemConversion::new("FLOUR", "cup", "g", Decimal::from(120)));
    let config = EngineConfig::default();
    println!("    配置: {:?}\n", config);

    let mut engine = PlanningEngine::new(catalog, converter, config);
    let store = MemoryStore::new();

    // ========== 2. 收貨 ==========
    println!("[2] 收貨");
    let now = Utc::now();
    let mut tx = store.begin()?;
    let receipts = [
        ("FLOUR", Decimal::from(5), "kg", Decimal::new(180, 2)),
        ("MOLASSES", Decimal::from(2), "l", Decimal::new(550, 2)),
        ("BUTTER", Decimal::from(2), "kg", Decimal::new(920, 2)),
        ("CHOCOLATE", Decimal::from(1), "kg", Decimal::from(24)),
        ("TIN-CAN", Decimal::from(30), "each", Decimal::new(275, 2)),
        ("RIBBON", Decimal::from(10), "m", Decimal::new(40, 2)),
    ];
    for (offset, (item, qty, unit, cost)) in receipts.iter().enumerate() {
        let lot = engine.receive_lot(&mut tx, item, *qty, unit, *cost, now - Duration::days(10 - offset as i64))?;
        println!("    {} {} {} @ {} (lot {})", item, qty, unit, cost, lot.id);
    }
    store.commit(tx)?;
    println!();

    // ========== 3. 計算計劃 ==========
    println!("[3] 計算生產計劃");
    let targets = vec![Target::bundle("HOLIDAY-ORDER", "HAMPER", Decimal::from(12))];
    let plan = {
        let read = store.begin()?;
        engine.calculate_plan(&read, &targets)?
    };

    for line in &plan.lines {
        match &line.batch {
            Some(batch) => println!(
                "    {}: 需要 {}，配置 {} × {} 批（產量 {}，損耗 {}）",
                line.recipe_id,
                line.units_required,
                batch.yield_label,
                batch.batches_to_run,
                batch.expected_yield,
                batch.waste
            ),
            None => println!("    {}: 現有成品足夠", line.recipe_id),
        }
    }
    println!("    採購清單:");
    for gap in &plan.gaps.purchase_items {
        println!("      - {} 需要 {} {}，現有 {}，缺 {}", gap.item_id, gap.needed, gap.unit, gap.on_hand, gap.gap);
    }
    for warning in &plan.warnings {
        println!("    ⚠ {}: {}", warning.subject, warning.message);
    }
    println!();

    // ========== 4. 補貨後生產 ==========
    println!("[4] 補貨並紀錄生產");
    let mut tx = store.begin()?;
    for gap in &plan.gaps.purchase_items {
        engine.receive_lot(&mut tx, &gap.item_id, gap.gap, &gap.unit, Decimal::from(3), Utc::now())?;
    }
    for line in &plan.lines {
        if let Some(batch) = &line.batch {
            let request = ProductionRequest::new(&line.recipe_id, batch.batches_to_run, batch.expected_yield.trunc().try_into()?)
                .with_yield_label(&batch.yield_label);
            let event = engine.record_production(&mut tx, &request)?;
            println!(
                "    {} × {} 批：總成本 {}，單位成本 {:?}",
                event.recipe_id, event.batches, event.total_cost, event.per_unit_cost
            );
        }
    }
    store.commit(tx)?;
    println!();

    // ========== 5. 組裝 ==========
    println!("[5] 組裝禮籃");
    let mut tx = store.begin()?;
    let assembly = engine.record_assembly(&mut tx, &AssemblyRequest::new("HAMPER", 10))?;
    store.commit(tx)?;
    println!(
        "    HAMPER × {}：總成本 {}，單位成本 {:?}\n",
        assembly.quantity, assembly.total_cost, assembly.per_unit_cost
    );

    // ========== 6. 進度 ==========
    println!("[6] 進度報表");
    let read = store.begin()?;
    let report = engine.evaluate_progress(&read, &targets)?;
    for progress in &report.targets {
        println!(
            "    {}: {}/{} ({}%) {:?}",
            progress.target_id, progress.produced, progress.target_quantity, progress.percent, progress.status
        );
        if let Some(feasibility) = &progress.feasibility {
            println!(
                "      剩餘可行: {}，估計原料成本 {}",
                feasibility.feasible, feasibility.estimated_cost
            );
        }
    }
    println!();

    // ========== 7. 過期判斷 ==========
    println!("[7] 修改配方後檢查計劃是否過期");
    if let Some(recipe) = engine.catalog().recipe("TRUFFLE") {
        engine
            .catalog_mut()
            .upsert_recipe(recipe.with_ingredient("SEA-SALT", Decimal::from(2), "g"));
    }
    let verdict = engine.check_staleness(plan.id)?;
    println!(
        "    過期: {}，原因: {}",
        verdict.stale,
        verdict.reason_text().unwrap_or_else(|| "-".to_string())
    );

    println!("\n===== 完成 =====");
    Ok(())
}
