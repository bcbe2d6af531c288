//! User-facing notification and status texts.

pub const CONFIG_MISSING: &str = "Configuração do banco de dados não encontrada.";
pub const ANONYMOUS_SIGN_IN_FAILED: &str =
    "Falha no login anônimo. Verifique as configurações do Supabase.";
pub const AUTH_FAILED: &str = "Falha na autenticação. Verifique suas credenciais.";

pub const PATIENTS_LOAD_FAILED: &str =
    "Erro ao carregar pacientes. Verifique as permissões do banco.";
pub const APPOINTMENTS_LOAD_FAILED: &str = "Erro ao carregar agendamentos.";

pub const PATIENT_SAVED: &str = "Paciente salvo com sucesso!";
pub const PATIENT_SAVE_FAILED: &str = "Erro ao salvar paciente.";
pub const DUPLICATE_NATIONAL_ID: &str = "Erro: O CPF informado já está cadastrado.";
pub const REQUIRED_FIELDS_MISSING: &str = "Erro: Nome e CPF são obrigatórios.";
pub const PATIENT_UPDATED: &str = "Cadastro atualizado!";
pub const PATIENT_UPDATE_FAILED: &str = "Erro ao atualizar paciente.";
pub const PATIENT_ARCHIVED: &str = "Paciente arquivado com sucesso.";
pub const PATIENT_ARCHIVE_FAILED: &str = "Erro ao arquivar paciente.";
pub const PATIENT_NOT_FOUND: &str = "Paciente não encontrado.";
pub const NO_PATIENT_SELECTED: &str = "Erro: Nenhum paciente selecionado.";

pub const CONSULTATION_SAVED: &str = "Nova consulta salva!";
pub const CONSULTATION_SAVE_FAILED: &str = "Erro ao salvar consulta.";
pub const CONSULTATION_ID_MISSING: &str = "Erro: ID da consulta não encontrado.";
pub const CONSULTATION_UPDATED: &str = "Consulta atualizada!";
pub const CONSULTATION_UPDATE_FAILED: &str = "Erro ao atualizar consulta.";

pub const APPOINTMENT_SAVED: &str = "Agendamento salvo com sucesso!";
pub const APPOINTMENT_SAVE_FAILED: &str = "Erro ao salvar agendamento.";
pub const APPOINTMENT_SCHEDULE_MISSING: &str = "Erro: Informe a data e o horário.";
pub const STATUS_UPDATE_FAILED: &str = "Erro ao atualizar status.";

pub const BUSY: &str = "Aguarde a conclusão da operação anterior.";
