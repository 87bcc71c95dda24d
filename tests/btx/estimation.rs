use super::equimolar_flash;
use approx::assert_relative_eq;
use btx_flash::*;

const VAPOR: f64 = 0.631425;
const LIQUID: f64 = 0.40906;

// an objective below 1e-8 bounds every residual by 1e-4
fn assert_reproduces_data(flash: &FlashUnit) -> FlashResult<()> {
    assert_relative_eq!(flash.vap_outlet()?.molefracs[0], VAPOR, epsilon = 1e-4);
    assert_relative_eq!(flash.liq_outlet()?.molefracs[0], LIQUID, epsilon = 1e-4);
    Ok(())
}

fn unfix_tau(flash: &mut FlashUnit, lower: f64, upper: f64) -> FlashResult<()> {
    for (i, j) in [("benzene", "toluene"), ("toluene", "benzene")] {
        let tau = flash.properties.tau_mut(i, j)?;
        tau.unfix();
        tau.setlb(lower);
        tau.setub(upper);
    }
    Ok(())
}

fn assert_tau_within(status: &EstimationStatus, lower: f64, upper: f64) {
    assert_eq!(status.parameters.len(), 2);
    for (key, value) in &status.parameters {
        assert!(matches!(key, VarKey::Tau(..)));
        assert!((lower..=upper).contains(value), "{key:?} = {value}");
    }
}

#[test]
fn test_estimate_tau() -> FlashResult<()> {
    let mut flash = equimolar_flash(368.0)?;
    flash.solve(SolverOptions::default())?;
    unfix_tau(&mut flash, -5.0, 5.0)?;
    assert_eq!(flash.degrees_of_freedom(), 2);

    let data = VleData::new("benzene", VAPOR, LIQUID);
    let estimation = ParameterEstimation::new(data, Loss::Linear);
    let status = estimation.solve(&mut flash, SolverOptions::default())?;
    println!("{status}");

    assert!(status.is_converged());
    assert!(status.objective >= 0.0);
    assert!(status.objective <= status.initial_objective);
    assert_tau_within(&status, -5.0, 5.0);

    // the flash is left solved at the estimated parameters
    for (key, value) in &status.parameters {
        assert_eq!(flash.var(*key)?.value(), *value);
    }
    let objective = estimation.objective(&flash)?;
    assert_relative_eq!(objective, status.objective, max_relative = 1e-8);
    assert!(flash.vapor_fraction()? > 0.0 && flash.vapor_fraction()? < 1.0);
    assert_reproduces_data(&flash)?;

    let report = status.to_string();
    assert!(report.contains("tau[benzene,toluene]"));
    assert!(report.contains("tau[toluene,benzene]"));
    Ok(())
}

#[test]
fn test_estimate_with_active_bounds() -> FlashResult<()> {
    let mut flash = equimolar_flash(368.0)?;
    unfix_tau(&mut flash, 0.0, 0.1)?;
    let data = Measurement::from_json("parameters/vle_data.json")?;
    let estimation = ParameterEstimation::new(data, Loss::Linear);
    let status = estimation.solve(&mut flash, SolverOptions::default())?;
    assert!(status.is_converged());
    assert!(status.objective <= status.initial_objective);
    assert_tau_within(&status, 0.0, 0.1);
    Ok(())
}

#[test]
fn test_robust_loss() -> FlashResult<()> {
    let mut flash = equimolar_flash(368.0)?;
    unfix_tau(&mut flash, -5.0, 5.0)?;
    let data = VleData::new("benzene", VAPOR, LIQUID);
    let estimation = ParameterEstimation::new(data, Loss::huber(0.01));
    let status = estimation.solve(&mut flash, SolverOptions::default())?;
    assert!(status.is_converged());
    assert!(status.objective <= status.initial_objective);
    assert_tau_within(&status, -5.0, 5.0);
    assert_reproduces_data(&flash)?;
    Ok(())
}

#[test]
fn test_nothing_to_estimate() -> FlashResult<()> {
    let mut flash = equimolar_flash(368.0)?;
    let estimation = ParameterEstimation::new(
        VleData::new("benzene", VAPOR, LIQUID),
        Loss::Linear,
    );
    assert!(estimation
        .solve(&mut flash, SolverOptions::default())
        .is_err());
    Ok(())
}

#[test]
fn test_unknown_component() -> FlashResult<()> {
    let mut flash = equimolar_flash(368.0)?;
    flash.solve(SolverOptions::default())?;
    let estimation = ParameterEstimation::new(VleData::new("xylene", 0.5, 0.5), Loss::Linear);
    assert!(matches!(
        estimation.predict(&flash),
        Err(FlashError::ComponentsNotFound(_))
    ));
    Ok(())
}

#[test]
fn test_iteration_limit() -> FlashResult<()> {
    let mut flash = equimolar_flash(368.0)?;
    unfix_tau(&mut flash, -5.0, 5.0)?;
    let estimation =
        ParameterEstimation::new(VleData::new("benzene", VAPOR, LIQUID), Loss::Linear);
    let options = SolverOptions::new().max_iter(1).tol(1e-30);
    let status = estimation.solve(&mut flash, options)?;
    assert_eq!(status.termination, TerminationCondition::MaxIterations);
    assert_eq!(status.iterations, 1);
    assert!(status.objective < status.initial_objective);
    Ok(())
}
