//! System prompt construction for the interviewer agent.

use crate::config::InterviewConfig;

/// Render the interviewer system prompt.
///
/// Pure template over the config: candidate details, the 1-based question
/// list, the duration target, and the personality dials as literal guidance
/// lines. Same config, same prompt.
pub fn build_prompt(config: &InterviewConfig) -> String {
    let questions = config
        .questions
        .iter()
        .enumerate()
        .map(|(i, q)| format!("{}. {}", i + 1, q))
        .collect::<Vec<_>>()
        .join("\n");

    let persona = config.interviewer_name.as_deref().unwrap_or("empathetic");
    let dials = config.personality;

    format!(
        "You are an AI interviewer conducting a professional interview.\n\
         \n\
         Candidate Information:\n\
         - Name: {name}\n\
         - Interview Objective: {objective}\n\
         \n\
         Interview Questions to Ask:\n\
         {questions}\n\
         \n\
         Interview Guidelines:\n\
         - Keep the interview to approximately {duration} minutes\n\
         - Ask each question clearly and wait for the candidate's response\n\
         - Ask thoughtful follow-up questions based on the candidate's answers\n\
         - Be professional, friendly, and {persona}\n\
         - Show empathy level: {empathy}/10\n\
         - Build rapport level: {rapport}/10\n\
         - Explore topics in depth: {exploration}/10\n\
         - Speaking pace: {speed}/10 (1=slow, 10=fast)\n\
         \n\
         Important:\n\
         - Do not repeat questions that have already been asked\n\
         - Keep questions concise (30 words or less)\n\
         - Use the candidate's name naturally in conversation\n\
         - End the interview gracefully when time is up or all questions are covered\n\
         - Thank the candidate for their time at the end",
        name = config.candidate_name,
        objective = config.objective,
        questions = questions,
        duration = config.duration_minutes,
        persona = persona,
        empathy = dials.empathy,
        rapport = dials.rapport,
        exploration = dials.exploration,
        speed = dials.speed,
    )
}
