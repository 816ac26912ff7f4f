//! Integration tests for the payroll engine.
//!
//! This suite drives the public API end to end:
//! - Kenyan statutory scenarios across formula eras (2018, 2023, 2025 tables)
//! - Salaried, casual and consultant pay
//! - Formula pins and reproducibility
//! - Queue / process / rerun semantics and idempotence
//! - The approval workflow and its audit trail
//! - Batch runs with partial failure, panics and cancellation
//! - Error cases

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use payroll_engine::catalog::FormulaCatalog;
use payroll_engine::config::{EngineSettings, FormulaLoader};
use payroll_engine::engine::Engine;
use payroll_engine::error::EngineResult;
use payroll_engine::models::{
    Allowance, ApprovalStatus, AuditAction, Component, Contract, DeductionPhase, EmployeeSnapshot,
    EmploymentType, FormulaCategory, FormulaOverrides, IncomeTaxMode, OneOffPayment,
    PaymentPeriod, PayrollStatus, Payslip, SalaryAdvance, SalaryDetails,
};
use payroll_engine::payroll::{
    BatchItemStatus, BatchRequest, BatchRunner, BatchSummary, CancellationFlag,
    EmployeeDirectory, EmployeeRecord, FixedClock, InMemoryDirectory, PayrollCommand,
    PayrollGenerator, PayrollResponse, PayslipStore,
};

// =============================================================================
// Test Helpers
// =============================================================================

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn period(s: &str) -> PaymentPeriod {
    s.parse().unwrap()
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 3, 28, 9, 0, 0).unwrap()))
}

fn details(monthly_salary: Option<&str>, daily_rate: Option<&str>) -> SalaryDetails {
    SalaryDetails {
        monthly_salary: monthly_salary.map(dec),
        daily_rate: daily_rate.map(dec),
        allowances: vec![],
        deduct_shif_or_nhif: true,
        deduct_nssf: true,
        income_tax: IncomeTaxMode::Primary,
    }
}

fn record(id: &str, employment_type: EmploymentType, details: Option<SalaryDetails>) -> EmployeeRecord {
    EmployeeRecord::new(EmployeeSnapshot {
        id: id.to_string(),
        name: format!("Employee {}", id),
        employment_type,
        salary_details: details,
    })
    .with_contract(Contract {
        start_date: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
        end_date: None,
    })
}

/// Salary 45,000 plus a 4,784 transport allowance: gross 49,784.
fn scenario_employee(id: &str) -> EmployeeRecord {
    let mut details = details(Some("45000"), None);
    details.allowances.push(Allowance {
        name: "transport".to_string(),
        amount: dec("4784"),
    });
    record(id, EmploymentType::Salaried, Some(details))
}

fn casual_employee() -> EmployeeRecord {
    let mut details = details(None, Some("1200"));
    details.deduct_nssf = false;
    record("cas_001", EmploymentType::Casual, Some(details)).with_attendance(period("2025-03"), 18)
}

fn consultant() -> EmployeeRecord {
    let mut details = details(Some("60000"), None);
    details.deduct_nssf = false;
    details.deduct_shif_or_nhif = false;
    details.income_tax = IncomeTaxMode::Secondary;
    record("con_001", EmploymentType::Consultant, Some(details)).with_one_off_payment(
        period("2025-03"),
        OneOffPayment {
            description: "Workshop facilitation".to_string(),
            amount: dec("15000"),
        },
    )
}

fn engine(records: Vec<EmployeeRecord>) -> Engine {
    let directory = InMemoryDirectory::from_records(records).unwrap();
    Engine::bootstrap_with_clock(EngineSettings::default(), Arc::new(directory), clock()).unwrap()
}

fn run(engine: &Engine, employee_id: &str, p: &str, command: PayrollCommand) -> PayrollResponse {
    engine.generator().generate_payroll(
        employee_id,
        period(p),
        false,
        command,
        &FormulaOverrides::none(),
    )
}

fn process(engine: &Engine, employee_id: &str, p: &str) -> Payslip {
    let response = run(engine, employee_id, p, PayrollCommand::Process);
    assert!(response.success, "generation failed: {:?}", response.error);
    response.payslip.unwrap()
}

fn actions(engine: &Engine, payslip: &Payslip) -> Vec<AuditAction> {
    engine
        .store()
        .audit_trail(payslip.id)
        .into_iter()
        .map(|entry| entry.action)
        .collect()
}

// =============================================================================
// Statutory scenarios
// =============================================================================

#[test]
fn test_2025_salaried_scenario() {
    let engine = engine(vec![scenario_employee("emp_001")]);
    let payslip = process(&engine, "emp_001", "2025-03");

    assert_eq!(payslip.basic_pay, dec("45000"));
    assert_eq!(payslip.allowances, dec("4784"));
    assert_eq!(payslip.gross_pay, dec("49784.00"));
    assert_eq!(payslip.nssf_tier_1_employee, dec("480.00"));
    assert_eq!(payslip.nssf_tier_2_employee, dec("2507.04"));
    assert_eq!(payslip.nssf_employee, dec("2987.04"));
    assert_eq!(payslip.nssf_employer, dec("2987.04"));
    assert_eq!(payslip.shif_employee, dec("1369.06"));
    assert_eq!(payslip.shif_employer, Decimal::ZERO);
    assert_eq!(payslip.housing_levy_employee, dec("746.76"));
    assert_eq!(payslip.housing_levy_employer, dec("746.76"));
    assert_eq!(payslip.deductions_before_tax, dec("5102.86"));
    assert_eq!(payslip.deductions_after_paye, Decimal::ZERO);
    assert_eq!(payslip.taxable_pay, dec("44681.14"));
    assert_eq!(payslip.paye, dec("8187.69"));
    assert_eq!(payslip.personal_relief, dec("2400.00"));
    assert_eq!(payslip.net_paye, dec("5787.69"));
    assert_eq!(payslip.net_pay, dec("38893.45"));
    assert_eq!(payslip.employer_cost(), dec("53517.80"));
    assert!(payslip.trace.warnings.is_empty());
}

#[test]
fn test_2024_nhif_era_deducts_health_and_housing_after_paye() {
    let engine = engine(vec![scenario_employee("emp_001")]);
    let payslip = process(&engine, "emp_001", "2024-03");

    assert_eq!(payslip.formulas["income"], "paye-primary-2023-07");
    assert_eq!(payslip.formulas["nssf"], "nssf-2024-02");
    assert_eq!(payslip.formulas["shif"], "nhif-2015-04");
    assert_eq!(payslip.nssf_employee, dec("2160.00"));
    assert_eq!(payslip.shif_employee, dec("1100.00"));
    assert_eq!(payslip.deductions_before_tax, dec("2160.00"));
    assert_eq!(payslip.deductions_after_paye, dec("1846.76"));
    assert_eq!(payslip.taxable_pay, dec("47624.00"));
    assert_eq!(payslip.paye, dec("9070.55"));
    assert_eq!(payslip.net_paye, dec("6670.55"));
    assert_eq!(payslip.net_pay, dec("39106.69"));

    let housing = payslip
        .deduction_lines
        .iter()
        .find(|line| line.component == Component::HousingLevy)
        .unwrap();
    assert_eq!(housing.phase, DeductionPhase::AfterPaye);
}

#[test]
fn test_legacy_income_formula_falls_back_and_warns() {
    let engine = engine(vec![scenario_employee("emp_001")]);
    let payslip = process(&engine, "emp_001", "2020-06");

    assert_eq!(payslip.formulas["income"], "paye-primary-2018-01");
    assert_eq!(payslip.nssf_employee, dec("1080.00"));
    assert_eq!(payslip.shif_employee, dec("1100.00"));
    assert_eq!(payslip.housing_levy_employee, dec("746.76"));
    assert_eq!(payslip.deductions_before_tax, dec("2926.76"));
    assert_eq!(payslip.taxable_pay, dec("46857.24"));
    assert_eq!(payslip.paye, dec("8131.56"));
    assert_eq!(payslip.personal_relief, dec("1408.00"));
    assert_eq!(payslip.net_pay, dec("40133.68"));

    assert_eq!(payslip.trace.warnings.len(), 1);
    assert_eq!(payslip.trace.warnings[0].code, "LEGACY_DEDUCTION_ORDER");
}

#[test]
fn test_high_earner_hits_nssf_cap() {
    let engine = engine(vec![record(
        "emp_002",
        EmploymentType::Salaried,
        Some(details(Some("150000"), None)),
    )]);
    let payslip = process(&engine, "emp_002", "2025-03");

    assert_eq!(payslip.nssf_employee, dec("4320.00"));
    assert_eq!(payslip.shif_employee, dec("4125.00"));
    assert_eq!(payslip.housing_levy_employee, dec("2250.00"));
    assert_eq!(payslip.taxable_pay, dec("139305.00"));
    assert_eq!(payslip.paye, dec("36574.85"));
    assert_eq!(payslip.net_pay, dec("105130.15"));
}

#[test]
fn test_casual_paid_for_days_present() {
    let engine = engine(vec![casual_employee()]);
    let payslip = process(&engine, "cas_001", "2025-03");

    assert_eq!(payslip.employment_type, EmploymentType::Casual);
    assert_eq!(payslip.basic_pay, dec("21600.00"));
    assert_eq!(payslip.nssf_employee, Decimal::ZERO);
    assert_eq!(payslip.shif_employee, dec("594.00"));
    assert_eq!(payslip.housing_levy_employee, dec("324.00"));
    assert_eq!(payslip.taxable_pay, dec("20682.00"));
    assert_eq!(payslip.paye, dec("2068.20"));
    assert_eq!(payslip.net_paye, Decimal::ZERO);
    assert_eq!(payslip.net_pay, dec("20682.00"));
    assert!(!payslip.formulas.contains_key("nssf"));
}

#[test]
fn test_casual_with_no_attendance_is_paid_nothing() {
    let engine = engine(vec![casual_employee()]);
    let payslip = process(&engine, "cas_001", "2025-04");
    assert_eq!(payslip.gross_pay, Decimal::ZERO);
    assert_eq!(payslip.shif_employee, Decimal::ZERO);
    assert_eq!(payslip.net_pay, Decimal::ZERO);
}

#[test]
fn test_consultant_fee_plus_one_off_on_secondary_table() {
    let engine = engine(vec![consultant()]);
    let payslip = process(&engine, "con_001", "2025-03");

    assert_eq!(payslip.basic_pay, dec("60000.00"));
    assert_eq!(payslip.other_payments, dec("15000.00"));
    assert_eq!(payslip.gross_pay, dec("75000.00"));
    assert_eq!(payslip.formulas["income"], "paye-secondary-2023-07");
    assert_eq!(payslip.deductions_before_tax, dec("1125.00"));
    assert_eq!(payslip.paye, dec("25856.25"));
    assert_eq!(payslip.personal_relief, Decimal::ZERO);
    assert_eq!(payslip.net_pay, dec("48018.75"));
}

#[test]
fn test_trace_records_every_step_in_order() {
    let engine = engine(vec![scenario_employee("emp_001")]);
    let payslip = process(&engine, "emp_001", "2025-03");

    let rules: Vec<&str> = payslip
        .trace
        .steps
        .iter()
        .map(|step| step.rule_id.as_str())
        .collect();
    assert_eq!(
        rules,
        vec![
            "earnings",
            "deduction_order",
            "nssf",
            "shif",
            "housing_levy",
            "taxable_pay",
            "paye",
            "net_pay"
        ]
    );
    for (index, step) in payslip.trace.steps.iter().enumerate() {
        assert_eq!(step.step_number, index as u32 + 1);
    }
}

// =============================================================================
// Formula pins
// =============================================================================

#[test]
fn test_pinned_nssf_formula() {
    let engine = engine(vec![scenario_employee("emp_001")]);
    let overrides = FormulaOverrides {
        nssf: Some("nssf-2024-02".to_string()),
        ..FormulaOverrides::default()
    };
    let response = engine.generator().generate_payroll(
        "emp_001",
        period("2025-03"),
        false,
        PayrollCommand::Process,
        &overrides,
    );
    let payslip = response.payslip.unwrap();
    assert_eq!(payslip.nssf_employee, dec("2160.00"));
    assert_eq!(payslip.deductions_before_tax, dec("4275.82"));
    assert_eq!(payslip.net_pay, dec("39472.38"));
    assert_eq!(payslip.formulas["nssf"], "nssf-2024-02");
}

#[test]
fn test_full_pin_set_reproduces_amounts_across_periods() {
    let engine = engine(vec![scenario_employee("emp_001")]);
    let overrides: FormulaOverrides = serde_json::from_str(
        r#"{
            "income": "paye-primary-2024-12",
            "nssf": "nssf-2025-02",
            "nhif": "shif-2024-10",
            "housing_levy": "housing-levy-2023-07"
        }"#,
    )
    .unwrap();

    let net_pay = |p: &str| {
        engine
            .generator()
            .generate_payroll("emp_001", period(p), false, PayrollCommand::Process, &overrides)
            .payslip
            .unwrap()
            .net_pay
    };
    assert_eq!(net_pay("2025-03"), dec("38893.45"));
    assert_eq!(net_pay("2024-03"), dec("38893.45"));
    assert_eq!(net_pay("2020-06"), dec("38893.45"));
}

#[test]
fn test_unknown_pin_fails_without_persisting() {
    let engine = engine(vec![scenario_employee("emp_001")]);
    let overrides = FormulaOverrides {
        shif: Some("shif-1999".to_string()),
        ..FormulaOverrides::default()
    };
    let response = engine.generator().generate_payroll(
        "emp_001",
        period("2025-03"),
        false,
        PayrollCommand::Process,
        &overrides,
    );
    assert!(!response.success);
    assert_eq!(response.error_code(), Some("FORMULA_NOT_FOUND"));
    assert!(engine.store().is_empty());
    assert_eq!(engine.store().audit_len(), 0);
}

#[test]
fn test_pin_of_wrong_kind_is_integrity_error() {
    let engine = engine(vec![scenario_employee("emp_001")]);
    let overrides = FormulaOverrides {
        income: Some("nssf-2025-02".to_string()),
        ..FormulaOverrides::default()
    };
    let response = engine.generator().generate_payroll(
        "emp_001",
        period("2025-03"),
        false,
        PayrollCommand::Process,
        &overrides,
    );
    assert_eq!(response.error_code(), Some("FORMULA_INTEGRITY"));
}

#[test]
fn test_missing_formula_is_fatal_for_the_payslip() {
    let catalog = FormulaCatalog::new();
    let seeds = FormulaLoader::builtin()
        .unwrap()
        .into_iter()
        .filter(|f| f.category != FormulaCategory::HousingLevy);
    catalog.seed(seeds).unwrap();
    let directory = InMemoryDirectory::from_records(vec![scenario_employee("emp_001")]).unwrap();
    let generator = PayrollGenerator::new(
        Arc::new(catalog),
        Arc::new(directory),
        Arc::new(PayslipStore::new()),
        &EngineSettings::default(),
    )
    .with_clock(clock());

    let response = generator.generate_payroll(
        "emp_001",
        period("2025-03"),
        false,
        PayrollCommand::Process,
        &FormulaOverrides::none(),
    );
    assert_eq!(response.error_code(), Some("FORMULA_NOT_FOUND"));
    assert!(response.detail().unwrap().contains("housing_levy"));
    assert!(generator.store().is_empty());
}

// =============================================================================
// Payslip reconciliation
// =============================================================================

fn salaried_at(salary: Decimal) -> Engine {
    let mut details = details(None, None);
    details.monthly_salary = Some(salary);
    engine(vec![record("emp_001", EmploymentType::Salaried, Some(details))])
}

fn assert_reconciles(payslip: &Payslip) {
    assert_eq!(
        payslip.nssf_employee + payslip.shif_employee + payslip.housing_levy_employee,
        payslip.deductions_before_tax
    );
    assert_eq!(
        payslip.nssf_tier_1_employee + payslip.nssf_tier_2_employee,
        payslip.nssf_employee
    );
    assert_eq!(
        payslip.gross_pay - payslip.deductions_before_tax,
        payslip.taxable_pay
    );
    assert_eq!(
        payslip.gross_pay - payslip.deductions_before_tax - payslip.net_paye,
        payslip.net_pay
    );
    assert_eq!(
        payslip
            .deduction_lines
            .iter()
            .filter(|line| line.phase == DeductionPhase::BeforeTax)
            .map(|line| line.employee_amount)
            .sum::<Decimal>(),
        payslip.deductions_before_tax
    );
}

#[test]
fn test_components_sum_to_stored_totals_to_the_cent() {
    // Every component carries a sub-cent remainder at this salary.
    let engine = salaried_at(dec("30237.57"));
    let payslip = process(&engine, "emp_001", "2025-03");

    assert_eq!(payslip.nssf_employee, dec("1814.25"));
    assert_eq!(payslip.shif_employee, dec("831.53"));
    assert_eq!(payslip.housing_levy_employee, dec("453.56"));
    assert_eq!(payslip.deductions_before_tax, dec("3099.34"));
    assert_eq!(payslip.taxable_pay, dec("27138.23"));
    assert_eq!(payslip.net_paye, dec("784.56"));
    assert_eq!(payslip.net_pay, dec("26353.67"));
    assert_reconciles(&payslip);
}

mod reconciliation {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_stored_payslip_adds_up(cents in 3_000_000i64..9_000_000i64) {
            let engine = salaried_at(Decimal::new(cents, 2));
            let payslip = process(&engine, "emp_001", "2025-03");
            assert_reconciles(&payslip);
        }
    }
}

#[test]
fn test_panicking_directory_is_reported_not_raised() {
    let generator = tripping_generator(&["emp_001"], "emp_001", Trip::Panic);
    let response = generator.generate_payroll(
        "emp_001",
        period("2025-03"),
        false,
        PayrollCommand::Process,
        &FormulaOverrides::none(),
    );

    assert!(!response.success);
    assert_eq!(response.error_code(), Some("CALCULATION_ERROR"));
    assert!(response.detail().unwrap().contains("directory backend crashed"));
    assert!(generator.store().is_empty());
    assert_eq!(generator.store().audit_len(), 0);
}

// =============================================================================
// Commands and idempotence
// =============================================================================

#[test]
fn test_process_twice_is_idempotent() {
    let engine = engine(vec![scenario_employee("emp_001")]);
    let first = process(&engine, "emp_001", "2025-03");
    let second = process(&engine, "emp_001", "2025-03");

    assert_eq!(first, second);
    assert_eq!(engine.store().len(), 1);
    assert_eq!(actions(&engine, &first), vec![AuditAction::Created]);
}

#[test]
fn test_queue_is_idempotent_and_zero_amount() {
    let engine = engine(vec![scenario_employee("emp_001")]);
    let first = run(&engine, "emp_001", "2025-03", PayrollCommand::Queue)
        .payslip
        .unwrap();
    let second = run(&engine, "emp_001", "2025-03", PayrollCommand::Queue)
        .payslip
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.payroll_status, PayrollStatus::Queued);
    assert_eq!(first.gross_pay, Decimal::ZERO);
    assert_eq!(engine.store().audit_len(), 1);
}

#[test]
fn test_rerun_of_queued_payslip_expires_it_first() {
    let engine = engine(vec![scenario_employee("emp_001")]);
    let queued = run(&engine, "emp_001", "2025-03", PayrollCommand::Queue)
        .payslip
        .unwrap();
    let rerun = run(&engine, "emp_001", "2025-03", PayrollCommand::Rerun)
        .payslip
        .unwrap();

    assert_eq!(rerun.id, queued.id);
    assert!(rerun.is_complete());
    assert_eq!(
        actions(&engine, &rerun),
        vec![AuditAction::Created, AuditAction::Expired, AuditAction::Draft]
    );
}

#[test]
fn test_rerun_recomputes_complete_payslip_and_resets_review() {
    let engine = engine(vec![scenario_employee("emp_001")]);
    let first = process(&engine, "emp_001", "2025-03");
    let review = engine.review();
    review.submit(first.id, "clerk", None).unwrap();
    review
        .reject(first.id, "manager", Some("check allowances".to_string()))
        .unwrap();

    let rerun = run(&engine, "emp_001", "2025-03", PayrollCommand::Rerun)
        .payslip
        .unwrap();
    assert_eq!(rerun.id, first.id);
    assert_eq!(rerun.created_at, first.created_at);
    assert_eq!(rerun.net_pay, first.net_pay);
    assert_eq!(rerun.approval_status, ApprovalStatus::Draft);
    assert_eq!(engine.store().len(), 1);
}

#[test]
fn test_rerun_refuses_approved_payslip_until_nulled() {
    let engine = engine(vec![scenario_employee("emp_001")]);
    let payslip = process(&engine, "emp_001", "2025-03");
    let review = engine.review();
    review.submit(payslip.id, "clerk", None).unwrap();
    review.approve(payslip.id, "manager", None).unwrap();

    let refused = run(&engine, "emp_001", "2025-03", PayrollCommand::Rerun);
    assert_eq!(refused.error_code(), Some("VALIDATION_ERROR"));
    assert_eq!(
        engine.store().find(payslip.id).unwrap().approval_status,
        ApprovalStatus::Approved
    );

    review
        .nullify(payslip.id, "manager", Some("wrong period".to_string()))
        .unwrap();
    let rerun = run(&engine, "emp_001", "2025-03", PayrollCommand::Rerun);
    assert!(rerun.success);
    let rerun = rerun.payslip.unwrap();
    assert!(rerun.is_complete());
    assert_eq!(rerun.approval_status, ApprovalStatus::Draft);

    assert_eq!(
        actions(&engine, &payslip),
        vec![
            AuditAction::Created,
            AuditAction::Submitted,
            AuditAction::Approved,
            AuditAction::Nulled,
            AuditAction::Draft
        ]
    );
}

#[test]
fn test_process_recomputes_nulled_payslip() {
    let engine = engine(vec![scenario_employee("emp_001")]);
    let payslip = process(&engine, "emp_001", "2025-03");
    engine.review().nullify(payslip.id, "manager", None).unwrap();

    let again = process(&engine, "emp_001", "2025-03");
    assert!(again.is_complete());
    assert_eq!(again.id, payslip.id);
}

#[test]
fn test_advance_recovery_in_final_phase() {
    let employee = scenario_employee("emp_001").with_advance(SalaryAdvance {
        id: "adv_1".to_string(),
        balance: dec("6000"),
        installment: dec("2000"),
    });
    let engine = engine(vec![employee]);
    let payslip = engine
        .generator()
        .generate_payroll(
            "emp_001",
            period("2025-03"),
            true,
            PayrollCommand::Process,
            &FormulaOverrides::none(),
        )
        .payslip
        .unwrap();

    assert_eq!(payslip.advance_recovery, dec("2000"));
    assert_eq!(payslip.deductions_final, dec("2000"));
    assert_eq!(payslip.net_pay, dec("36893.45"));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_missing_salary_details_is_validation_error() {
    let engine = engine(vec![record("emp_003", EmploymentType::Salaried, None)]);
    let response = run(&engine, "emp_003", "2025-03", PayrollCommand::Process);
    assert!(!response.success);
    let error = response.error.unwrap();
    assert_eq!(error.code, "VALIDATION_ERROR");
    assert_eq!(error.field.as_deref(), Some("salary_details"));
    assert!(engine.store().is_empty());
}

#[test]
fn test_no_active_contract_is_validation_error() {
    let mut employee = consultant();
    employee.contracts = vec![Contract {
        start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        end_date: Some(NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()),
    }];
    let engine = engine(vec![employee]);
    let response = run(&engine, "con_001", "2025-03", PayrollCommand::Queue);
    assert_eq!(
        response.error.unwrap().field.as_deref(),
        Some("contract")
    );
}

#[test]
fn test_missing_daily_rate_is_validation_error() {
    let engine = engine(vec![record(
        "cas_002",
        EmploymentType::Casual,
        Some(details(None, None)),
    )]);
    let response = run(&engine, "cas_002", "2025-03", PayrollCommand::Process);
    assert_eq!(response.error.unwrap().field.as_deref(), Some("daily_rate"));
}

#[test]
fn test_period_beyond_horizon_is_validation_error() {
    let engine = engine(vec![scenario_employee("emp_001")]);
    let response = run(&engine, "emp_001", "2027-01", PayrollCommand::Queue);
    assert_eq!(
        response.error.unwrap().field.as_deref(),
        Some("payment_period")
    );
}

// =============================================================================
// Batch runs
// =============================================================================

/// What a [`TrippingDirectory`] does when asked for its trip employee.
enum Trip {
    Panic,
    Cancel(CancellationFlag),
}

/// Directory that panics, or cancels a batch, when asked for one employee.
struct TrippingDirectory {
    inner: InMemoryDirectory,
    trip_on: String,
    trip: Trip,
}

impl EmployeeDirectory for TrippingDirectory {
    fn employee(&self, employee_id: &str) -> EngineResult<EmployeeSnapshot> {
        if employee_id == self.trip_on {
            match &self.trip {
                Trip::Panic => panic!("directory backend crashed"),
                Trip::Cancel(cancel) => cancel.cancel(),
            }
        }
        self.inner.employee(employee_id)
    }

    fn active_contract(&self, employee_id: &str, period: PaymentPeriod) -> Option<Contract> {
        self.inner.active_contract(employee_id, period)
    }

    fn present_days(&self, employee_id: &str, period: PaymentPeriod) -> u32 {
        self.inner.present_days(employee_id, period)
    }

    fn one_off_payments(&self, employee_id: &str, period: PaymentPeriod) -> Vec<OneOffPayment> {
        self.inner.one_off_payments(employee_id, period)
    }

    fn outstanding_advances(&self, employee_id: &str) -> Vec<SalaryAdvance> {
        self.inner.outstanding_advances(employee_id)
    }

    fn employee_ids(&self) -> Vec<String> {
        self.inner.employee_ids()
    }
}

fn tripping_generator(ids: &[&str], trip_on: &str, trip: Trip) -> Arc<PayrollGenerator> {
    let catalog = FormulaCatalog::new();
    catalog.seed(FormulaLoader::builtin().unwrap()).unwrap();
    let directory = TrippingDirectory {
        inner: InMemoryDirectory::from_records(ids.iter().map(|id| scenario_employee(id))).unwrap(),
        trip_on: trip_on.to_string(),
        trip,
    };
    Arc::new(
        PayrollGenerator::new(
            Arc::new(catalog),
            Arc::new(directory),
            Arc::new(PayslipStore::new()),
            &EngineSettings::default(),
        )
        .with_clock(clock()),
    )
}

fn batch_request(ids: &[&str]) -> BatchRequest {
    BatchRequest {
        employee_ids: ids.iter().map(|id| id.to_string()).collect(),
        payment_period: period("2025-03"),
        recover_advances: false,
        command: PayrollCommand::Process,
        formula_overrides: FormulaOverrides::none(),
    }
}

#[tokio::test]
async fn test_batch_continues_past_failures_in_input_order() {
    let engine = engine(vec![
        scenario_employee("emp_001"),
        casual_employee(),
        consultant(),
        record("emp_003", EmploymentType::Salaried, None),
    ]);
    let results = engine
        .batch_runner()
        .run(
            batch_request(&["con_001", "emp_003", "ghost", "emp_001", "cas_001"]),
            &CancellationFlag::new(),
        )
        .await;

    let ids: Vec<&str> = results.iter().map(|r| r.employee_id.as_str()).collect();
    assert_eq!(ids, vec!["con_001", "emp_003", "ghost", "emp_001", "cas_001"]);
    let statuses: Vec<BatchItemStatus> = results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            BatchItemStatus::Succeeded,
            BatchItemStatus::Failed,
            BatchItemStatus::Failed,
            BatchItemStatus::Succeeded,
            BatchItemStatus::Succeeded
        ]
    );
    assert!(results[2].detail.as_deref().unwrap().contains("ghost"));
    assert_eq!(engine.store().for_period(period("2025-03")).len(), 3);
    assert_eq!(
        engine.store().get("emp_001", period("2025-03")).unwrap().net_pay,
        dec("38893.45")
    );
}

#[tokio::test]
async fn test_batch_rerun_is_idempotent() {
    let engine = engine(vec![scenario_employee("emp_001"), scenario_employee("emp_002")]);
    let runner = engine.batch_runner();
    let first = runner
        .run(batch_request(&["emp_001", "emp_002"]), &CancellationFlag::new())
        .await;
    let second = runner
        .run(batch_request(&["emp_001", "emp_002"]), &CancellationFlag::new())
        .await;

    assert_eq!(first, second);
    assert_eq!(engine.store().len(), 2);
}

#[tokio::test]
async fn test_batch_cancelled_before_start_schedules_nothing() {
    let engine = engine(vec![scenario_employee("emp_001"), casual_employee()]);
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let results = engine
        .batch_runner()
        .run(batch_request(&["emp_001", "cas_001"]), &cancel)
        .await;

    assert_eq!(
        BatchSummary::of(&results),
        BatchSummary {
            succeeded: 0,
            failed: 0,
            cancelled: 2
        }
    );
    assert!(engine.store().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_batch_worker_panic_fails_only_that_employee() {
    let generator = tripping_generator(&["emp_001", "emp_002"], "emp_002", Trip::Panic);
    let runner = BatchRunner::new(Arc::clone(&generator), 1);

    let results = runner
        .run(batch_request(&["emp_001", "emp_002"]), &CancellationFlag::new())
        .await;

    assert_eq!(results[0].status, BatchItemStatus::Succeeded);
    assert_eq!(results[1].status, BatchItemStatus::Failed);
    assert_eq!(
        results[1].response.as_ref().unwrap().error_code(),
        Some("CALCULATION_ERROR")
    );
    assert!(
        results[1]
            .detail
            .as_deref()
            .unwrap()
            .contains("directory backend crashed")
    );
    assert_eq!(generator.store().len(), 1);
}

#[tokio::test]
async fn test_batch_cancelled_mid_run_keeps_committed_payslips() {
    let cancel = CancellationFlag::new();
    let ids = ["emp_001", "emp_002", "emp_003"];
    let generator = tripping_generator(&ids, "emp_001", Trip::Cancel(cancel.clone()));
    let runner = BatchRunner::new(Arc::clone(&generator), 1);

    let results = runner.run(batch_request(&ids), &cancel).await;

    let statuses: Vec<BatchItemStatus> = results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            BatchItemStatus::Succeeded,
            BatchItemStatus::Cancelled,
            BatchItemStatus::Cancelled
        ]
    );
    let store = generator.store();
    assert_eq!(store.len(), 1);
    assert_eq!(
        store.get("emp_001", period("2025-03")).unwrap().net_pay,
        dec("38893.45")
    );
    assert!(store.get("emp_002", period("2025-03")).is_none());
    assert!(store.get("emp_003", period("2025-03")).is_none());
}

// =============================================================================
// Demo roster
// =============================================================================

#[tokio::test]
async fn test_demo_roster_batch() {
    let directory = InMemoryDirectory::load("./demos/employees.yaml").unwrap();
    assert_eq!(directory.len(), 5);
    let ids = directory.employee_ids();
    let engine =
        Engine::bootstrap_with_clock(EngineSettings::default(), Arc::new(directory), clock()).unwrap();

    let mut request = batch_request(&[]);
    request.employee_ids = ids;
    request.recover_advances = true;
    let results = engine
        .batch_runner()
        .run(request, &CancellationFlag::new())
        .await;

    assert_eq!(
        BatchSummary::of(&results),
        BatchSummary {
            succeeded: 4,
            failed: 1,
            cancelled: 0
        }
    );
    let store = engine.store();
    let march = period("2025-03");
    assert_eq!(store.get("emp_001", march).unwrap().net_pay, dec("36893.45"));
    assert_eq!(store.get("emp_002", march).unwrap().net_pay, dec("105130.15"));
    assert_eq!(store.get("cas_001", march).unwrap().net_pay, dec("20682.00"));
    assert_eq!(store.get("con_001", march).unwrap().net_pay, dec("48018.75"));
    assert!(store.get("emp_003", march).is_none());
}
